//! JSON witness layout of the Noir circuits.
//!
//! Field names follow the circuit ABI. Noir has no null, so optional values
//! are a `{_is_some, _value}` pair with a zero placeholder when absent; that
//! encoding exists only here. Upstream code uses `Option`.

use serde::{Deserialize, Serialize};

use shadepool_core::{Amount, Fr, INPUT_NOTES, MERKLE_TREE_DEPTH, OUTPUT_NOTES};

use crate::builder::{BridgeInput, UnsignedTransfer};
use crate::error::WalletError;
use crate::signer::{PublicKey, RecoverableSignature};

/// Noir `Option<T>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoirOption<T> {
    /// Whether `value` is meaningful.
    #[serde(rename = "_is_some")]
    pub is_some: bool,
    /// Payload, or a placeholder when absent.
    #[serde(rename = "_value")]
    pub value: T,
}

impl<T> NoirOption<T> {
    /// A present value.
    pub fn some(value: T) -> Self {
        Self {
            is_some: true,
            value,
        }
    }

    /// An absent value carrying `placeholder`.
    pub fn none(placeholder: T) -> Self {
        Self {
            is_some: false,
            value: placeholder,
        }
    }

    /// Back to a Rust `Option`.
    pub fn into_option(self) -> Option<T> {
        self.is_some.then_some(self.value)
    }
}

/// Spent note as the circuit sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInputNote {
    /// Commitment blinding.
    pub blinding: Fr,
    /// Note amount; zero for padding.
    pub amount: Amount,
    /// Compressed proof index.
    pub leaf_index: Fr,
    /// Authentication path.
    pub leaf_siblings: [Fr; MERKLE_TREE_DEPTH],
}

/// Created note as the circuit sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitOutputNote {
    /// Recipient address as a field element.
    pub recipient: Fr,
    /// Commitment blinding.
    pub blinding: Fr,
    /// Note amount.
    pub amount: Amount,
    /// 0 for transfer, 1 for withdrawal.
    pub transfer_type: u8,
}

/// Opening of a bridge burn commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitWormholeNote {
    /// Burn address owner.
    pub recipient: Fr,
    /// Secret chosen at deposit.
    pub wormhole_secret: Fr,
    /// Field identifier of the bridged asset.
    pub asset_id: Fr,
    /// Depositor.
    pub sender: Fr,
    /// Bridged amount.
    pub amount: Amount,
}

impl CircuitWormholeNote {
    fn placeholder() -> Self {
        Self {
            recipient: Fr::zero(),
            wormhole_secret: Fr::zero(),
            asset_id: Fr::zero(),
            sender: Fr::zero(),
            amount: Amount::zero(),
        }
    }
}

/// Private and public witness of the 2-in/2-out transfer circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInputs {
    /// Signer public key, x coordinate.
    pub pub_key_x: [u8; 32],
    /// Signer public key, y coordinate.
    pub pub_key_y: [u8; 32],
    /// 64-byte `r || s`.
    pub signature: Vec<u8>,
    /// Signed digest as a field element.
    pub hashed_message: Fr,
    /// Root of the shielded tree.
    pub shielded_root: Fr,
    /// Root of the wormhole tree, zero when unused.
    pub wormhole_root: Fr,
    /// Asset of every note.
    pub asset_id: Fr,
    /// Owner of the inputs.
    pub owner_address: Fr,
    /// Spent notes.
    pub input_notes: [CircuitInputNote; INPUT_NOTES],
    /// Created notes.
    pub output_notes: [CircuitOutputNote; OUTPUT_NOTES],
    /// Bridge entry being consumed.
    pub wormhole_note: NoirOption<CircuitWormholeNote>,
    /// Wormhole proof index.
    pub wormhole_leaf_index: NoirOption<Fr>,
    /// Wormhole authentication path.
    pub wormhole_leaf_siblings: NoirOption<[Fr; MERKLE_TREE_DEPTH]>,
    /// Screening result of the entry.
    pub wormhole_approved: NoirOption<bool>,
    /// Set when no entry is consumed.
    pub wormhole_pseudo_secret: NoirOption<Fr>,
}

impl CircuitInputs {
    /// Lay out a built transfer together with its authorization.
    pub fn assemble(
        tx: &UnsignedTransfer,
        public_key: &PublicKey,
        signature: &RecoverableSignature,
    ) -> Self {
        let input_notes = tx.inputs.clone().map(|input| CircuitInputNote {
            blinding: input.note.blinding,
            amount: input.note.amount,
            leaf_index: Fr::from_u64(input.note.leaf_index),
            leaf_siblings: input.siblings,
        });
        let output_notes = tx.outputs.map(|out| CircuitOutputNote {
            recipient: out.recipient.to_field(),
            blinding: out.blinding,
            amount: out.amount,
            transfer_type: out.kind as u8,
        });

        let zero_path = [Fr::zero(); MERKLE_TREE_DEPTH];
        let (wormhole_note, leaf_index, siblings, approved, pseudo) = match &tx.bridge {
            BridgeInput::Entry(ctx) => (
                NoirOption::some(CircuitWormholeNote {
                    recipient: ctx.note.recipient.to_field(),
                    wormhole_secret: ctx.note.secret,
                    asset_id: ctx.note.asset_id,
                    sender: ctx.note.sender.to_field(),
                    amount: ctx.note.amount,
                }),
                NoirOption::some(Fr::from_u64(ctx.proof.index)),
                NoirOption::some(ctx.proof.padded_siblings()),
                NoirOption::some(true),
                NoirOption::none(Fr::zero()),
            ),
            BridgeInput::Pseudo { secret } => (
                NoirOption::none(CircuitWormholeNote::placeholder()),
                NoirOption::none(Fr::zero()),
                NoirOption::none(zero_path),
                NoirOption::none(false),
                NoirOption::some(*secret),
            ),
        };

        Self {
            pub_key_x: public_key.x,
            pub_key_y: public_key.y,
            signature: signature.compact(),
            hashed_message: tx.hashed_message,
            shielded_root: tx.shielded_root,
            wormhole_root: tx.wormhole_root,
            asset_id: tx.asset_id,
            owner_address: tx.owner.to_field(),
            input_notes,
            output_notes,
            wormhole_note,
            wormhole_leaf_index: leaf_index,
            wormhole_leaf_siblings: siblings,
            wormhole_approved: approved,
            wormhole_pseudo_secret: pseudo,
        }
    }
}

/// Public inputs of the transfer circuit in verifier order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs {
    /// Signed digest as a field element.
    pub hashed_message: Fr,
    /// Shielded tree root.
    pub shielded_root: Fr,
    /// Wormhole tree root.
    pub wormhole_root: Fr,
    /// Real or pseudo wormhole nullifier.
    pub wormhole_nullifier: Fr,
    /// Input nullifiers.
    pub nullifiers: [Fr; INPUT_NOTES],
    /// Output commitments.
    pub commitments: [Fr; OUTPUT_NOTES],
}

impl PublicInputs {
    /// Public inputs a built transfer will expose.
    pub fn from_transfer(tx: &UnsignedTransfer) -> Self {
        Self {
            hashed_message: tx.hashed_message,
            shielded_root: tx.shielded_root,
            wormhole_root: tx.wormhole_root,
            wormhole_nullifier: tx.wormhole_nullifier,
            nullifiers: tx.inputs.clone().map(|i| i.nullifier),
            commitments: tx.commitments,
        }
    }

    /// Flatten in verifier order.
    pub fn to_fields(&self) -> Vec<Fr> {
        let mut out = vec![
            self.hashed_message,
            self.shielded_root,
            self.wormhole_root,
            self.wormhole_nullifier,
        ];
        out.extend_from_slice(&self.nullifiers);
        out.extend_from_slice(&self.commitments);
        out
    }

    /// Inverse of [`PublicInputs::to_fields`].
    pub fn from_fields(fields: &[Fr]) -> Result<Self, WalletError> {
        if fields.len() != 4 + INPUT_NOTES + OUTPUT_NOTES {
            return Err(WalletError::InvalidRequest(format!(
                "expected {} public inputs, got {}",
                4 + INPUT_NOTES + OUTPUT_NOTES,
                fields.len()
            )));
        }
        let mut nullifiers = [Fr::zero(); INPUT_NOTES];
        nullifiers.copy_from_slice(&fields[4..4 + INPUT_NOTES]);
        let mut commitments = [Fr::zero(); OUTPUT_NOTES];
        commitments.copy_from_slice(&fields[4 + INPUT_NOTES..]);
        Ok(Self {
            hashed_message: fields[0],
            shielded_root: fields[1],
            wormhole_root: fields[2],
            wormhole_nullifier: fields[3],
            nullifiers,
            commitments,
        })
    }
}

/// Witness of the ragequit circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagequitInputs {
    /// Wormhole tree root.
    pub wormhole_root: Fr,
    /// Opening of the entry.
    pub wormhole_note: CircuitWormholeNote,
    /// Leaf position of the entry.
    pub wormhole_leaf_index: Fr,
    /// Authentication path.
    pub wormhole_leaf_siblings: [Fr; MERKLE_TREE_DEPTH],
    /// Screening result.
    pub is_approved: bool,
}

impl RagequitInputs {
    /// Witness for ragequitting `note` at `leaf_index`.
    pub fn new(
        wormhole_root: Fr,
        note: &shadepool_core::WormholeNote,
        leaf_index: u64,
        siblings: [Fr; MERKLE_TREE_DEPTH],
        is_approved: bool,
    ) -> Self {
        Self {
            wormhole_root,
            wormhole_note: CircuitWormholeNote {
                recipient: note.recipient.to_field(),
                wormhole_secret: note.secret,
                asset_id: note.asset_id,
                sender: note.sender.to_field(),
                amount: note.amount,
            },
            wormhole_leaf_index: Fr::from_u64(leaf_index),
            wormhole_leaf_siblings: siblings,
            is_approved,
        }
    }
}

/// Public inputs of the ragequit circuit in verifier order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RagequitPublicInputs {
    /// Wormhole tree root.
    pub wormhole_root: Fr,
    /// Burn commitment of the entry.
    pub wormhole_commitment: Fr,
    /// Entry nullifier.
    pub wormhole_nullifier: Fr,
    /// Depositor as a field element.
    pub wormhole_sender: Fr,
}

impl RagequitPublicInputs {
    /// Flatten in verifier order.
    pub fn to_fields(&self) -> Vec<Fr> {
        vec![
            self.wormhole_root,
            self.wormhole_commitment,
            self.wormhole_nullifier,
            self.wormhole_sender,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadepool_core::Address;

    #[test]
    fn noir_option_uses_underscored_keys() {
        let json = serde_json::to_value(NoirOption::some(Fr::from_u64(3))).unwrap();
        assert_eq!(json["_is_some"], true);
        assert!(json["_value"].is_string());

        let none: NoirOption<bool> = NoirOption::none(false);
        assert_eq!(none.into_option(), None);
    }

    #[test]
    fn public_inputs_order() {
        let fields: Vec<Fr> = (1..=8).map(Fr::from_u64).collect();
        let parsed = PublicInputs::from_fields(&fields).unwrap();
        assert_eq!(parsed.wormhole_nullifier, Fr::from_u64(4));
        assert_eq!(parsed.nullifiers, [Fr::from_u64(5), Fr::from_u64(6)]);
        assert_eq!(parsed.commitments, [Fr::from_u64(7), Fr::from_u64(8)]);
        assert_eq!(parsed.to_fields(), fields);
        assert!(PublicInputs::from_fields(&fields[..7]).is_err());
    }

    #[test]
    fn ragequit_layout() {
        let note = shadepool_core::WormholeNote {
            recipient: Address([1; 20]),
            sender: Address([2; 20]),
            secret: Fr::from_u64(42069),
            asset_id: Fr::from_u64(1),
            amount: Amount::from_units(5),
        };
        let inputs = RagequitInputs::new(Fr::from_u64(9), &note, 3, [Fr::zero(); 20], false);
        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json["is_approved"], false);
        assert_eq!(json["wormhole_leaf_siblings"].as_array().unwrap().len(), 20);
        assert!(json["wormhole_note"]["wormhole_secret"].is_string());
    }
}
