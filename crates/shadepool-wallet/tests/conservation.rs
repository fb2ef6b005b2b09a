use proptest::prelude::*;
use rand_core::OsRng;

use shadepool_core::{asset_id, commitment_for, Address, Amount, Fr, Hash32, TransferKind};
use shadepool_state::{AppendOnlyMerkleTree, TreeKind, TreeSnapshot};
use shadepool_wallet::{
    build_transfer, BuildParams, Eip712Domain, NoteStatus, Selection, ShieldedNoteRecord,
    TransferRequest, TreeView, UnsignedTransfer, WalletError,
};

const OWNER: Address = Address([0x0a; 20]);
const TOKEN: Address = Address([0xee; 20]);

fn note(leaf_index: u64, amount: u128) -> ShieldedNoteRecord {
    let blinding = Fr::from_u64(1_000 + leaf_index);
    let amount = Amount::from_units(amount);
    ShieldedNoteRecord {
        chain_id: 1,
        tree_id: 0,
        leaf_index,
        owner: OWNER,
        token: TOKEN,
        token_id: 0,
        blinding,
        amount,
        commitment: commitment_for(OWNER, blinding, asset_id(TOKEN, 0), amount, TransferKind::Transfer),
        status: NoteStatus::Available,
        created_in: Hash32::zero(),
        used_in: None,
    }
}

fn view(notes: &[ShieldedNoteRecord], padding: u64) -> TreeView {
    let mut leaves: Vec<Fr> = (0..padding).map(|i| Fr::from_u64(i + 1)).collect();
    leaves.extend(notes.iter().map(|n| n.commitment));
    let tree = AppendOnlyMerkleTree::from_leaves(leaves.clone()).unwrap();
    let snapshot = TreeSnapshot {
        tree_id: 0,
        root: tree.root(),
        size: tree.len(),
        leaves,
        created_at: 0,
        updated_at: 0,
    };
    TreeView::from_snapshot(TreeKind::Shielded, &snapshot).unwrap()
}

/// Builds until the signing digest lands below the modulus.
fn build(
    selection: &Selection,
    shielded: &TreeView,
    request: &TransferRequest,
) -> Result<UnsignedTransfer, WalletError> {
    let domain = Eip712Domain::new(1, Address([0x5e; 20]));
    let wormhole = TreeView::empty(TreeKind::Wormhole, 0);
    for _ in 0..128 {
        let result = build_transfer(
            BuildParams {
                chain_id: 1,
                owner: OWNER,
                domain: &domain,
                request,
                selection,
                shielded,
                wormhole: &wormhole,
            },
            &mut OsRng,
        );
        match result {
            Err(WalletError::FieldOverflow(_)) => continue,
            other => return other,
        }
    }
    panic!("digest never fell below the modulus");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn outputs_sum_to_inputs(
        a in 1u128..1_000_000_000_000,
        b in 0u128..1_000_000_000_000,
        pay_frac in 0u128..=100,
        padding in 0u64..5,
    ) {
        let mut notes = vec![note(padding, a)];
        if b > 0 {
            notes.push(note(padding + 1, b));
        }
        let total = a + b;
        let pay = total * pay_frac / 100;
        let shielded = view(&notes, padding);
        let selection = Selection { notes, entry: None };
        let request = TransferRequest {
            receiver: Address([0x7e; 20]),
            token: TOKEN,
            token_id: 0,
            amount: Amount::from_units(pay),
            kind: TransferKind::Transfer,
        };

        let tx = build(&selection, &shielded, &request).unwrap();
        let out: u128 = tx.outputs.iter().map(|o| o.amount.units()).sum();
        prop_assert_eq!(out, total);
        prop_assert_eq!(tx.outputs[1].amount, Amount::from_units(pay));
        prop_assert_eq!(tx.outputs[0].amount, Amount::from_units(total - pay));
        prop_assert!(tx.pseudo_secret().is_some());
        prop_assert_eq!(tx.shielded_root, shielded.root());
        prop_assert_eq!(tx.spent_notes().len(), selection.notes.len());
    }

    #[test]
    fn overspend_is_rejected(a in 1u128..1_000_000, extra in 1u128..1_000) {
        let notes = vec![note(0, a)];
        let shielded = view(&notes, 0);
        let selection = Selection { notes, entry: None };
        let request = TransferRequest {
            receiver: Address([0x7e; 20]),
            token: TOKEN,
            token_id: 0,
            amount: Amount::from_units(a + extra),
            kind: TransferKind::Transfer,
        };
        let is_insufficient = matches!(
            build(&selection, &shielded, &request),
            Err(WalletError::InsufficientFunds { .. })
        );
        prop_assert!(is_insufficient);
    }
}
