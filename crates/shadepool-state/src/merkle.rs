//! Append-only Merkle tree for commitments.
//!
//! Lean incremental layout: every level is stored densely and a node with no
//! right sibling is carried to the next level unchanged instead of being hashed
//! with a zero subtree. Consequences:
//! - depth is `ceil(log2(size))`, so a single leaf is its own root
//! - the empty tree has root zero
//! - proofs only contain siblings that exist, and the path index is
//!   recompressed from the bits of the levels that contributed one
//!
//! Node combiner: `hash2(left, right)` (Poseidon2).

use shadepool_core::{hash2, Fr, MAX_TREE_LEAVES, MERKLE_TREE_DEPTH};

use crate::error::StateError;

/// An append-only Merkle tree storing every level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppendOnlyMerkleTree {
    /// `nodes[0]` holds the leaves, `nodes[depth]` holds only the root.
    nodes: Vec<Vec<Fr>>,
}

/// Membership proof for a single leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Root the proof was generated against.
    pub root: Fr,
    /// The proven leaf.
    pub leaf: Fr,
    /// Path bits of the levels that contributed a sibling, LSB first.
    pub index: u64,
    /// Siblings bottom-up, only for levels where one exists.
    pub siblings: Vec<Fr>,
}

impl AppendOnlyMerkleTree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Rebuild a tree from an ordered leaf sequence.
    pub fn from_leaves<I: IntoIterator<Item = Fr>>(leaves: I) -> Result<Self, StateError> {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.insert(leaf)?;
        }
        Ok(tree)
    }

    /// Return number of leaves.
    pub fn len(&self) -> u64 {
        self.nodes.first().map_or(0, |l| l.len() as u64)
    }

    /// Return whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current depth, `ceil(log2(len))`.
    pub fn depth(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// All leaves in insertion order.
    pub fn leaves(&self) -> &[Fr] {
        self.nodes.first().map_or(&[], |l| l.as_slice())
    }

    /// Leaf at `index`, if present.
    pub fn leaf(&self, index: u64) -> Option<Fr> {
        self.leaves().get(usize::try_from(index).ok()?).copied()
    }

    /// Current root. Zero for the empty tree.
    pub fn root(&self) -> Fr {
        self.nodes
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(Fr::zero)
    }

    /// Append a leaf, returning its position.
    pub fn insert(&mut self, leaf: Fr) -> Result<u64, StateError> {
        let position = self.len();
        if position >= MAX_TREE_LEAVES {
            return Err(StateError::TreeFull);
        }

        let depth = depth_for(position + 1);
        while self.nodes.len() < depth + 1 {
            self.nodes.push(Vec::new());
        }

        let mut node = leaf;
        let mut index = position as usize;
        for level in 0..depth {
            let row = &mut self.nodes[level];
            if index < row.len() {
                row[index] = node;
            } else {
                row.push(node);
            }
            if index & 1 == 1 {
                node = hash2(row[index - 1], node);
            }
            index >>= 1;
        }
        self.nodes[depth] = vec![node];

        Ok(position)
    }

    /// Proof for the leaf at `index`.
    pub fn generate_proof(&self, index: u64) -> Result<MerkleProof, StateError> {
        let leaf = self.leaf(index).ok_or(StateError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;

        let mut siblings = Vec::with_capacity(self.depth());
        let mut path = 0u64;
        let mut cursor = index as usize;
        for level in 0..self.depth() {
            let is_right = cursor & 1 == 1;
            let sibling_index = if is_right { cursor - 1 } else { cursor + 1 };
            if let Some(sibling) = self.nodes[level].get(sibling_index) {
                if is_right {
                    path |= 1 << siblings.len();
                }
                siblings.push(*sibling);
            }
            cursor >>= 1;
        }

        Ok(MerkleProof {
            root: self.root(),
            leaf,
            index: path,
            siblings,
        })
    }
}

impl MerkleProof {
    /// Siblings zero-padded to the circuit depth.
    pub fn padded_siblings(&self) -> [Fr; MERKLE_TREE_DEPTH] {
        let mut out = [Fr::zero(); MERKLE_TREE_DEPTH];
        for (slot, sibling) in out.iter_mut().zip(&self.siblings) {
            *slot = *sibling;
        }
        out
    }

    /// Whether the proof reproduces its own root.
    pub fn verify(&self) -> bool {
        compute_root(self.leaf, self.index, &self.padded_siblings()) == self.root
    }
}

/// Recompute a root the way the circuit does: walk a zero-padded path, skip
/// zero siblings, and consume one index bit per non-zero sibling.
pub fn compute_root(leaf: Fr, index: u64, siblings: &[Fr]) -> Fr {
    let mut node = leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        if sibling.is_zero() {
            continue;
        }
        node = if (index >> level) & 1 == 1 {
            hash2(*sibling, node)
        } else {
            hash2(node, *sibling)
        };
    }
    node
}

fn depth_for(len: u64) -> usize {
    if len <= 1 {
        0
    } else {
        (u64::BITS - (len - 1).leading_zeros()) as usize
    }
}
