//! State transition errors.

use shadepool_core::Fr;
use thiserror::Error;

use crate::events::TreeKind;

/// Errors produced by event validation or tree maintenance.
#[derive(Debug, Error)]
pub enum StateError {
    /// A nullifier was already present in its spent set.
    #[error("double spend detected: nullifier {nullifier} already spent")]
    DoubleSpend {
        /// The repeated nullifier.
        nullifier: Fr,
    },

    /// Event arrived at or before the last applied position.
    #[error("event out of order: ({block}, {log_index}) is not after ({last_block}, {last_log_index})")]
    OutOfOrder {
        /// Block of the rejected event.
        block: u64,
        /// Log index of the rejected event.
        log_index: u64,
        /// Block of the last applied event.
        last_block: u64,
        /// Log index of the last applied event.
        last_log_index: u64,
    },

    /// An event claimed a leaf position other than the tree's next slot.
    #[error("{kind:?} tree {tree_id}: event claims leaf {claimed}, tree holds {len}")]
    LeafIndexMismatch {
        /// Tree family.
        kind: TreeKind,
        /// Tree id.
        tree_id: u64,
        /// Position claimed by the event.
        claimed: u64,
        /// Current tree length.
        len: u64,
    },

    /// A bridge entry id was announced twice.
    #[error("wormhole entry {0} already exists")]
    DuplicateEntry(u64),

    /// An event referenced a bridge entry that was never announced.
    #[error("unknown wormhole entry {0}")]
    UnknownEntry(u64),

    /// A bridge entry cannot move to the requested status.
    #[error("wormhole entry {entry_id}: invalid status change {from} -> {to}")]
    InvalidEntryTransition {
        /// Entry id.
        entry_id: u64,
        /// Current status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },

    /// A tree reached its maximum number of leaves.
    #[error("merkle tree is full")]
    TreeFull,

    /// Proof requested for a position past the end of the tree.
    #[error("leaf index {index} out of range (tree holds {len})")]
    IndexOutOfRange {
        /// Requested position.
        index: u64,
        /// Current tree length.
        len: u64,
    },

    /// Arithmetic overflow while accumulating amounts.
    #[error("amount overflow")]
    AmountOverflow,
}
