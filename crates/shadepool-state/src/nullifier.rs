//! Spent-nullifier sets.
//!
//! The projector keeps two of these: one for shielded-note nullifiers and one
//! for bridge (and pseudo) nullifiers. Only presence matters; iteration order
//! is exposed sorted so replays can be compared.

use hashbrown::HashSet;

use shadepool_core::Fr;

/// In-memory set of spent nullifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NullifierSet {
    set: HashSet<Fr>,
}

impl NullifierSet {
    /// Create a new empty nullifier set.
    pub fn new() -> Self {
        Self {
            set: HashSet::new(),
        }
    }

    /// Returns `true` if the nullifier has already been seen.
    pub fn contains(&self, nf: &Fr) -> bool {
        self.set.contains(nf)
    }

    /// Insert a nullifier.
    ///
    /// Returns `true` if the nullifier was newly inserted, `false` if it already existed.
    pub fn insert(&mut self, nf: Fr) -> bool {
        self.set.insert(nf)
    }

    /// Number of spent nullifiers tracked.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// All members in ascending order.
    pub fn sorted(&self) -> Vec<Fr> {
        let mut out: Vec<Fr> = self.set.iter().copied().collect();
        out.sort();
        out
    }

    /// First nullifier in `candidates` that is already spent or repeated
    /// within `candidates` itself.
    pub fn first_conflict<'a, I>(&self, candidates: I) -> Option<Fr>
    where
        I: IntoIterator<Item = &'a Fr>,
    {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .find(|nf| self.set.contains(*nf) || !seen.insert(**nf))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_novelty() {
        let mut set = NullifierSet::new();
        assert!(set.insert(Fr::from_u64(1)));
        assert!(!set.insert(Fr::from_u64(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn conflict_detects_intra_batch_repeat() {
        let set = NullifierSet::new();
        let batch = [Fr::from_u64(3), Fr::from_u64(4), Fr::from_u64(3)];
        assert_eq!(set.first_conflict(&batch), Some(Fr::from_u64(3)));
    }

    #[test]
    fn conflict_detects_already_spent() {
        let mut set = NullifierSet::new();
        set.insert(Fr::from_u64(4));
        let batch = [Fr::from_u64(3), Fr::from_u64(4)];
        assert_eq!(set.first_conflict(&batch), Some(Fr::from_u64(4)));
        assert_eq!(set.first_conflict(&[Fr::from_u64(5)]), None);
    }
}
