//! Commitment, nullifier and burn-address derivations.
//!
//! Each function here is mirrored constraint-for-constraint by the circuits
//! and the pool contract. Argument order is part of the protocol.

use crate::constants::WORMHOLE_DOMAIN_TAG;
use crate::field::Fr;
use crate::hash::{hash2, hash3, hash4, hash5};
use crate::types::{Address, Amount, InputNote, OutputNote, TransferKind, WormholeNote};

/// `assetId = H(token, tokenId)`.
pub fn asset_id(token: Address, token_id: u128) -> Fr {
    hash2(token.to_field(), Fr::from_u128(token_id))
}

/// `H(recipient, blinding)`: the hiding half of a commitment.
pub fn recipient_hash(recipient: Fr, blinding: Fr) -> Fr {
    hash2(recipient, blinding)
}

/// Commitment published for an output note.
///
/// Public outputs (zero blinding) and withdrawals commit to the raw recipient;
/// everything else is `H(H(recipient, blinding), assetId, amount, kind)`.
pub fn note_commitment(asset_id: Fr, note: &OutputNote) -> Fr {
    let recipient = note.recipient.to_field();
    if note.blinding.is_zero() || note.kind == TransferKind::Withdrawal {
        return recipient;
    }
    hash4(
        recipient_hash(recipient, note.blinding),
        asset_id,
        note.amount.to_field(),
        note.kind.to_field(),
    )
}

/// Nullifier revealed when spending a shielded note.
///
/// `H(leafIndex, blinding, H(owner, assetId, amount))`
pub fn note_nullifier(owner: Address, asset_id: Fr, note: &InputNote) -> Fr {
    let secret_commitment = hash3(owner.to_field(), asset_id, note.amount.to_field());
    hash3(Fr::from_u64(note.leaf_index), note.blinding, secret_commitment)
}

/// The `"ZKWORMHOLE"` tag as a field element.
pub fn wormhole_domain_tag() -> Fr {
    Fr::from_be_bytes_reduce(WORMHOLE_DOMAIN_TAG)
}

/// Address a depositor sends funds to: low 160 bits of
/// `H(recipient, secret, tag)`.
pub fn wormhole_burn_address(recipient: Address, secret: Fr) -> Address {
    let digest = hash3(recipient.to_field(), secret, wormhole_domain_tag());
    Address::from_field_low(digest)
}

/// Leaf appended to the wormhole tree once a deposit is screened.
///
/// `H(approved, sender, burnAddress, assetId, amount)`
pub fn wormhole_burn_commitment(note: &WormholeNote, approved: bool) -> Fr {
    let burn = wormhole_burn_address(note.recipient, note.secret);
    hash5(
        Fr::from(approved),
        note.sender.to_field(),
        burn.to_field(),
        note.asset_id,
        note.amount.to_field(),
    )
}

/// Nullifier consuming a bridge entry.
///
/// `H(1, secret, H(recipient, assetId, sender, amount))`
pub fn wormhole_nullifier(note: &WormholeNote) -> Fr {
    let secret_commitment = hash4(
        note.recipient.to_field(),
        note.asset_id,
        note.sender.to_field(),
        note.amount.to_field(),
    );
    hash3(Fr::one(), note.secret, secret_commitment)
}

/// Stand-in bridge nullifier for transfers that consume no entry.
///
/// `H(1, pseudoSecret, H(owner, assetId, 0, 0))`
pub fn wormhole_pseudo_nullifier(owner: Address, asset_id: Fr, pseudo_secret: Fr) -> Fr {
    let pseudo_commitment = hash4(owner.to_field(), asset_id, Fr::zero(), Fr::zero());
    hash3(Fr::one(), pseudo_secret, pseudo_commitment)
}

/// Convenience for callers holding an amount rather than a note.
pub fn commitment_for(
    recipient: Address,
    blinding: Fr,
    asset_id: Fr,
    amount: Amount,
    kind: TransferKind,
) -> Fr {
    note_commitment(
        asset_id,
        &OutputNote {
            recipient: recipient.into(),
            blinding,
            amount,
            kind,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recipient;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn transfer_note() -> OutputNote {
        OutputNote {
            recipient: Recipient::Address(addr(0x11)),
            blinding: Fr::from_u64(777),
            amount: Amount::from_units(5),
            kind: TransferKind::Transfer,
        }
    }

    #[test]
    fn commitment_is_deterministic() {
        let asset = asset_id(addr(0x22), 0);
        assert_eq!(
            note_commitment(asset, &transfer_note()),
            note_commitment(asset, &transfer_note())
        );
    }

    #[test]
    fn each_field_changes_commitment() {
        let asset = asset_id(addr(0x22), 0);
        let base = note_commitment(asset, &transfer_note());

        let mut n = transfer_note();
        n.recipient = Recipient::Address(addr(0x12));
        assert_ne!(note_commitment(asset, &n), base);

        let mut n = transfer_note();
        n.blinding = Fr::from_u64(778);
        assert_ne!(note_commitment(asset, &n), base);

        let mut n = transfer_note();
        n.amount = Amount::from_units(6);
        assert_ne!(note_commitment(asset, &n), base);

        let mut n = transfer_note();
        n.kind = TransferKind::Withdrawal;
        assert_ne!(note_commitment(asset, &n), base);

        assert_ne!(note_commitment(asset_id(addr(0x22), 1), &transfer_note()), base);
    }

    #[test]
    fn commitment_matches_circuit_vector() {
        let asset = asset_id(addr(0x22), 0);
        assert_eq!(
            asset,
            "0x1ecb6b63079c0601237702703a7590bbac31adb81fffef2488e9b03c78baf5fd"
                .parse()
                .unwrap()
        );
        assert_eq!(
            note_commitment(asset, &transfer_note()),
            "0x2bd2c7b82470fc685559010c0a6b5b200fdda937f1b7a99762a8de9784cd280e"
                .parse()
                .unwrap()
        );
    }

    #[test]
    fn withdrawal_and_public_outputs_commit_to_recipient() {
        let asset = asset_id(addr(0x22), 0);
        let mut n = transfer_note();
        n.kind = TransferKind::Withdrawal;
        assert_eq!(note_commitment(asset, &n), addr(0x11).to_field());

        let mut n = transfer_note();
        n.blinding = Fr::zero();
        assert_eq!(note_commitment(asset, &n), addr(0x11).to_field());
    }

    #[test]
    fn nullifier_depends_on_leaf_index() {
        let asset = asset_id(addr(0x22), 0);
        let a = InputNote {
            blinding: Fr::from_u64(9),
            amount: Amount::from_units(5),
            leaf_index: 0,
        };
        let b = InputNote { leaf_index: 1, ..a };
        assert_ne!(
            note_nullifier(addr(0x11), asset, &a),
            note_nullifier(addr(0x11), asset, &b)
        );
    }

    #[test]
    fn domain_tag_is_ascii_integer() {
        // "ZKWORMHOLE" = 0x5a4b574f524d484f4c45
        let expected: Fr = "0x5a4b574f524d484f4c45".parse().unwrap();
        assert_eq!(wormhole_domain_tag(), expected);
    }

    #[test]
    fn burn_address_is_low_bits_of_digest() {
        let recipient = addr(0x33);
        let secret = Fr::from_u64(42069);
        let digest = hash3(recipient.to_field(), secret, wormhole_domain_tag());
        assert_eq!(
            wormhole_burn_address(recipient, secret).0,
            digest.as_bytes()[12..]
        );
        assert_ne!(
            wormhole_burn_address(recipient, secret),
            wormhole_burn_address(recipient, Fr::from_u64(42070))
        );
    }

    #[test]
    fn approval_flag_changes_burn_commitment() {
        let note = WormholeNote {
            recipient: addr(0x33),
            sender: addr(0x44),
            secret: Fr::from_u64(42069),
            asset_id: Fr::one(),
            amount: Amount::from_units(100),
        };
        assert_ne!(
            wormhole_burn_commitment(&note, true),
            wormhole_burn_commitment(&note, false)
        );
    }

    #[test]
    fn pseudo_nullifier_differs_from_real() {
        let note = WormholeNote {
            recipient: addr(0x33),
            sender: addr(0x44),
            secret: Fr::from_u64(42069),
            asset_id: Fr::one(),
            amount: Amount::from_units(100),
        };
        let real = wormhole_nullifier(&note);
        let pseudo = wormhole_pseudo_nullifier(note.recipient, note.asset_id, note.secret);
        assert_ne!(real, pseudo);
        assert_eq!(
            pseudo,
            hash3(
                Fr::one(),
                note.secret,
                hash4(note.recipient.to_field(), Fr::one(), Fr::zero(), Fr::zero())
            )
        );
    }
}
