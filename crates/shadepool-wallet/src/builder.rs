//! Witness construction for a 2-in/2-out shielded transfer.
//!
//! Pure: takes the selected records, the rebuilt trees and a source of
//! randomness, and produces everything the owner has to sign and the prover
//! has to see. Nothing here touches the store or the network.

use rand_core::{CryptoRng, RngCore};
use tracing::debug;

use shadepool_core::{
    asset_id, note_commitment, note_nullifier, wormhole_nullifier, wormhole_pseudo_nullifier,
    Address, Amount, Fr, Hash32, InputNote, OutputNote, Recipient, TransferKind, Withdrawal,
    WormholeNote, INPUT_NOTES, MERKLE_TREE_DEPTH, OUTPUT_NOTES,
};
use shadepool_state::{AppendOnlyMerkleTree, MerkleProof, TreeKind, TreeSnapshot};

use crate::error::WalletError;
use crate::message::{Eip712Domain, ShieldedTxMessage};
use crate::selection::Selection;

/// What the caller asked to move. The sender is always the session account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    /// Who receives the amount.
    pub receiver: Address,
    /// Token contract.
    pub token: Address,
    /// Zero for fungible tokens.
    pub token_id: u128,
    /// Exact amount moved.
    pub amount: Amount,
    /// Transfer or withdrawal.
    pub kind: TransferKind,
}

/// A tree rebuilt locally from indexer leaves.
#[derive(Clone, Debug)]
pub struct TreeView {
    kind: TreeKind,
    tree_id: u64,
    tree: AppendOnlyMerkleTree,
}

impl TreeView {
    /// A tree with no leaves.
    pub fn empty(kind: TreeKind, tree_id: u64) -> Self {
        Self {
            kind,
            tree_id,
            tree: AppendOnlyMerkleTree::new(),
        }
    }

    /// Rebuild from a snapshot and check the reported root.
    pub fn from_snapshot(kind: TreeKind, snapshot: &TreeSnapshot) -> Result<Self, WalletError> {
        let tree = AppendOnlyMerkleTree::from_leaves(snapshot.leaves.iter().copied())?;
        let view = Self {
            kind,
            tree_id: snapshot.tree_id,
            tree,
        };
        if view.tree.len() != snapshot.size {
            return Err(view.desync(format!(
                "snapshot reports {} leaves but carries {}",
                snapshot.size,
                view.tree.len()
            )));
        }
        if view.tree.root() != snapshot.root {
            return Err(view.desync(format!(
                "rebuilt root {} differs from reported {}",
                view.tree.root(),
                snapshot.root
            )));
        }
        Ok(view)
    }

    /// `from_snapshot` when the indexer knows the tree, empty otherwise.
    pub fn load(
        kind: TreeKind,
        tree_id: u64,
        snapshot: Option<&TreeSnapshot>,
    ) -> Result<Self, WalletError> {
        match snapshot {
            Some(s) if s.tree_id != tree_id => Err(Self::empty(kind, tree_id)
                .desync(format!("indexer returned tree {}", s.tree_id))),
            Some(s) => Self::from_snapshot(kind, s),
            None => Ok(Self::empty(kind, tree_id)),
        }
    }

    /// Which tree this is.
    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    /// Index of this tree in its chain.
    pub fn tree_id(&self) -> u64 {
        self.tree_id
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }

    /// Number of leaves.
    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    /// True before the first leaf.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Proof for `leaf_index`, after checking the leaf there is `expected`.
    pub fn prove(&self, leaf_index: u64, expected: Fr) -> Result<MerkleProof, WalletError> {
        match self.tree.leaf(leaf_index) {
            Some(leaf) if leaf == expected => Ok(self.tree.generate_proof(leaf_index)?),
            Some(leaf) => Err(self.desync(format!(
                "leaf {leaf_index} is {leaf}, expected {expected}"
            ))),
            None => Err(self.desync(format!(
                "leaf {leaf_index} missing from tree of {} leaves",
                self.tree.len()
            ))),
        }
    }

    fn desync(&self, reason: String) -> WalletError {
        WalletError::TreeDesync {
            kind: self.kind,
            tree_id: self.tree_id,
            reason,
        }
    }
}

/// A bridge entry being consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeContext {
    /// Indexer id of the entry.
    pub entry_id: u64,
    /// Opening of the burn commitment.
    pub note: WormholeNote,
    /// Inclusion in the wormhole tree.
    pub proof: MerkleProof,
}

/// The bridge slot of a transfer: a real entry, or a pseudo-nullifier secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeInput {
    /// Spend this bridge entry.
    Entry(BridgeContext),
    /// No entry; the nullifier is derived from a fresh secret.
    Pseudo {
        /// Fresh secret behind the pseudo-nullifier.
        secret: Fr,
    },
}

/// One input slot of the circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedInput {
    /// `leaf_index` is the compressed proof index, as the circuit consumes it.
    pub note: InputNote,
    /// Authentication path of the input.
    pub siblings: [Fr; MERKLE_TREE_DEPTH],
    /// Nullifier the input publishes.
    pub nullifier: Fr,
    /// Store id of the spent note; `None` for padding.
    pub record_id: Option<String>,
}

/// A fully built transfer awaiting the owner's signature.
#[derive(Clone, Debug)]
pub struct UnsignedTransfer {
    /// Chain the transfer is bound to.
    pub chain_id: u64,
    /// Account that owns the inputs and signs.
    pub owner: Address,
    /// Token contract.
    pub token: Address,
    /// Token id within the contract.
    pub token_id: u128,
    /// Field identifier of `(token, token_id)`.
    pub asset_id: Fr,
    /// Spent notes, padded.
    pub inputs: [PreparedInput; INPUT_NOTES],
    /// Receiver note then change note.
    pub outputs: [OutputNote; OUTPUT_NOTES],
    /// Commitments of `outputs`, in order.
    pub commitments: [Fr; OUTPUT_NOTES],
    /// Tree the inputs are proven against.
    pub shielded_tree_id: u64,
    /// Root the inputs are proven against.
    pub shielded_root: Fr,
    /// Tree the bridge entry is proven against.
    pub wormhole_tree_id: u64,
    /// Zero when no entry is consumed.
    pub wormhole_root: Fr,
    /// Entry or pseudo secret in the bridge slot.
    pub bridge: BridgeInput,
    /// Real or pseudo wormhole nullifier.
    pub wormhole_nullifier: Fr,
    /// Public payouts; empty for transfers.
    pub withdrawals: Vec<Withdrawal>,
    /// Message the owner signs.
    pub message: ShieldedTxMessage,
    /// EIP-712 digest of `message`.
    pub digest: Hash32,
    /// `digest` as a field element.
    pub hashed_message: Fr,
}

impl UnsignedTransfer {
    /// Input nullifiers in slot order, padding included.
    pub fn nullifiers(&self) -> Vec<Fr> {
        self.inputs.iter().map(|i| i.nullifier).collect()
    }

    /// Store ids of the notes this transfer spends.
    pub fn spent_notes(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter_map(|i| i.record_id.clone())
            .collect()
    }

    /// Entry id, when a bridge entry is spent.
    pub fn consumed_entry(&self) -> Option<u64> {
        match &self.bridge {
            BridgeInput::Entry(ctx) => Some(ctx.entry_id),
            BridgeInput::Pseudo { .. } => None,
        }
    }

    /// Secret behind a pseudo-nullifier.
    pub fn pseudo_secret(&self) -> Option<Fr> {
        match self.bridge {
            BridgeInput::Pseudo { secret } => Some(secret),
            BridgeInput::Entry(_) => None,
        }
    }
}

/// Everything the builder needs besides randomness.
pub struct BuildParams<'a> {
    /// Chain the transfer is bound to.
    pub chain_id: u64,
    /// Signing account.
    pub owner: Address,
    /// EIP-712 domain of the pool contract.
    pub domain: &'a Eip712Domain,
    /// What to send.
    pub request: &'a TransferRequest,
    /// Chosen inputs.
    pub selection: &'a Selection,
    /// Shielded tree the notes live in.
    pub shielded: &'a TreeView,
    /// Wormhole tree the entry lives in.
    pub wormhole: &'a TreeView,
}

/// Fails unless outputs sum exactly to inputs.
pub fn check_conservation(inputs: &[Amount], outputs: &[Amount]) -> Result<(), WalletError> {
    let total_in = Amount::checked_sum(inputs.iter().copied())?;
    let total_out = Amount::checked_sum(outputs.iter().copied())?;
    if total_in != total_out {
        return Err(WalletError::ConservationViolated {
            inputs: total_in,
            outputs: total_out,
        });
    }
    Ok(())
}

/// Assemble the circuit witness and signing message for `params`.
///
/// Fails with [`WalletError::FieldOverflow`] when the digest does not embed
/// in the field; a retry draws fresh blindings.
pub fn build_transfer<R: RngCore + CryptoRng>(
    params: BuildParams<'_>,
    rng: &mut R,
) -> Result<UnsignedTransfer, WalletError> {
    let BuildParams {
        chain_id,
        owner,
        domain,
        request,
        selection,
        shielded,
        wormhole,
    } = params;

    if selection.notes.len() > INPUT_NOTES {
        return Err(WalletError::InvalidRequest(format!(
            "at most {INPUT_NOTES} shielded inputs, got {}",
            selection.notes.len()
        )));
    }
    let asset = asset_id(request.token, request.token_id);

    let mut inputs = Vec::with_capacity(INPUT_NOTES);
    for record in &selection.notes {
        if record.tree_id != shielded.tree_id() {
            return Err(WalletError::InvalidRequest(format!(
                "note {} is not in shielded tree {}",
                record.id(),
                shielded.tree_id()
            )));
        }
        if record.owner != owner || record.asset_id() != asset {
            return Err(WalletError::InvalidRequest(format!(
                "note {} does not belong to this transfer",
                record.id()
            )));
        }
        if record.expected_commitment() != record.commitment {
            return Err(WalletError::TreeDesync {
                kind: TreeKind::Shielded,
                tree_id: record.tree_id,
                reason: format!("note {} opening does not match its commitment", record.id()),
            });
        }
        let proof = shielded.prove(record.leaf_index, record.commitment)?;
        let note = InputNote {
            blinding: record.blinding,
            amount: record.amount,
            leaf_index: proof.index,
        };
        inputs.push(PreparedInput {
            note,
            siblings: proof.padded_siblings(),
            nullifier: note_nullifier(owner, asset, &note),
            record_id: Some(record.id()),
        });
    }
    while inputs.len() < INPUT_NOTES {
        let note = InputNote {
            blinding: Fr::random(rng),
            amount: Amount::zero(),
            leaf_index: 0,
        };
        inputs.push(PreparedInput {
            note,
            siblings: [Fr::zero(); MERKLE_TREE_DEPTH],
            nullifier: note_nullifier(owner, asset, &note),
            record_id: None,
        });
    }

    let (bridge, bridge_amount) = match &selection.entry {
        Some(entry) => {
            let position = entry.position.ok_or_else(|| {
                WalletError::InvalidRequest(format!("entry {} has not been screened", entry.entry_id))
            })?;
            if position.tree_id != wormhole.tree_id() {
                return Err(WalletError::InvalidRequest(format!(
                    "entry {} is not in wormhole tree {}",
                    entry.entry_id,
                    wormhole.tree_id()
                )));
            }
            let note = entry.note();
            if note.asset_id != asset || entry.recipient != owner {
                return Err(WalletError::InvalidRequest(format!(
                    "entry {} does not belong to this transfer",
                    entry.entry_id
                )));
            }
            let proof = wormhole.prove(position.leaf_index, entry.expected_commitment(true))?;
            let ctx = BridgeContext {
                entry_id: entry.entry_id,
                note,
                proof,
            };
            (BridgeInput::Entry(ctx), entry.amount)
        }
        None => (
            BridgeInput::Pseudo {
                secret: Fr::random(rng),
            },
            Amount::zero(),
        ),
    };
    let wormhole_nullifier = match &bridge {
        BridgeInput::Entry(ctx) => wormhole_nullifier(&ctx.note),
        BridgeInput::Pseudo { secret } => wormhole_pseudo_nullifier(owner, asset, *secret),
    };

    let mut in_amounts: Vec<Amount> = inputs.iter().map(|i| i.note.amount).collect();
    in_amounts.push(bridge_amount);
    let total_in = Amount::checked_sum(in_amounts.iter().copied())?;
    let change = total_in
        .checked_sub(request.amount)
        .map_err(|_| WalletError::InsufficientFunds {
            requested: request.amount,
            available: total_in,
        })?;

    let outputs = [
        OutputNote {
            recipient: Recipient::Address(owner),
            blinding: Fr::random(rng),
            amount: change,
            kind: TransferKind::Transfer,
        },
        OutputNote {
            recipient: Recipient::Address(request.receiver),
            blinding: Fr::random(rng),
            amount: request.amount,
            kind: request.kind,
        },
    ];
    check_conservation(&in_amounts, &outputs.map(|o| o.amount))?;
    let commitments = outputs.map(|o| note_commitment(asset, &o));

    let withdrawals: Vec<Withdrawal> = outputs
        .iter()
        .filter(|o| o.kind == TransferKind::Withdrawal)
        .map(|o| Withdrawal {
            to: match o.recipient {
                Recipient::Address(a) => a,
                Recipient::Raw(fr) => Address::from_field_low(fr),
            },
            asset: request.token,
            token_id: request.token_id,
            amount: o.amount,
        })
        .collect();

    let inputs: [PreparedInput; INPUT_NOTES] = inputs
        .try_into()
        .map_err(|_| WalletError::InvalidRequest("input arity".into()))?;

    let message = ShieldedTxMessage {
        chain_id,
        wormhole_root: wormhole.root(),
        wormhole_nullifier,
        shielded_root: shielded.root(),
        nullifiers: inputs.iter().map(|i| i.nullifier).collect(),
        commitments: commitments.to_vec(),
        withdrawals: withdrawals.clone(),
    };
    let (digest, hashed_message) = message.hashed_message(domain)?;

    debug!(
        inputs = selection.notes.len(),
        bridged = selection.entry.is_some(),
        withdrawals = withdrawals.len(),
        "built transfer"
    );

    Ok(UnsignedTransfer {
        chain_id,
        owner,
        token: request.token,
        token_id: request.token_id,
        asset_id: asset,
        inputs,
        outputs,
        commitments,
        shielded_tree_id: shielded.tree_id(),
        shielded_root: shielded.root(),
        wormhole_tree_id: wormhole.tree_id(),
        wormhole_root: wormhole.root(),
        bridge,
        wormhole_nullifier,
        withdrawals,
        message,
        digest,
        hashed_message,
    })
}
