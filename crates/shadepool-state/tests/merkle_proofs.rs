use proptest::prelude::*;
use shadepool_core::{Fr, MERKLE_TREE_DEPTH};
use shadepool_state::{compute_root, AppendOnlyMerkleTree};

fn tree_of(n: u64) -> AppendOnlyMerkleTree {
    AppendOnlyMerkleTree::from_leaves((0..n).map(|i| Fr::from_u64(i * 7 + 3))).unwrap()
}

#[test]
fn every_leaf_of_small_trees_round_trips() {
    for n in 1..=17u64 {
        let tree = tree_of(n);
        for i in 0..n {
            let proof = tree.generate_proof(i).unwrap();
            let padded = proof.padded_siblings();
            assert_eq!(padded.len(), MERKLE_TREE_DEPTH);
            assert_eq!(
                compute_root(proof.leaf, proof.index, &padded),
                tree.root(),
                "n={n} i={i}"
            );
        }
    }
}

#[test]
fn proof_against_older_root_fails_after_growth() {
    let mut tree = tree_of(4);
    let proof = tree.generate_proof(1).unwrap();
    tree.insert(Fr::from_u64(999)).unwrap();
    assert_ne!(
        compute_root(proof.leaf, proof.index, &proof.padded_siblings()),
        tree.root()
    );
}

#[test]
fn tampered_leaf_does_not_verify() {
    let tree = tree_of(6);
    let mut proof = tree.generate_proof(4).unwrap();
    proof.leaf = Fr::from_u64(123_456);
    assert!(!proof.verify());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn proof_reproduces_root(n in 1u64..64, pick in any::<u64>()) {
        let tree = tree_of(n);
        let i = pick % n;
        let proof = tree.generate_proof(i).unwrap();
        prop_assert!(proof.siblings.len() <= MERKLE_TREE_DEPTH);
        prop_assert_eq!(
            compute_root(proof.leaf, proof.index, &proof.padded_siblings()),
            tree.root()
        );
    }
}
