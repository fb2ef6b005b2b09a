//! Wallet-side failures.
//!
//! None of these are retried internally. A failing pipeline step returns
//! before anything is persisted.

use shadepool_core::{Amount, CoreError, Hash32};
use shadepool_state::{StateError, TreeKind};
use thiserror::Error;

/// Failures of the wallet pipeline and its store.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Selection cannot cover the requested amount.
    #[error("insufficient funds: requested {requested}, spendable {available}")]
    InsufficientFunds {
        /// Amount asked for.
        requested: Amount,
        /// Spendable total for the asset.
        available: Amount,
    },

    /// Insert of an id that already exists.
    #[error("{table} record {id} already exists")]
    DoubleRecord {
        /// Store table.
        table: &'static str,
        /// Record id.
        id: String,
    },

    /// Update or lookup of an id that does not exist.
    #[error("{table} record {id} does not exist")]
    MissingRecord {
        /// Store table.
        table: &'static str,
        /// Record id.
        id: String,
    },

    /// Status change that would move a record backwards.
    #[error("{table} record {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        /// Store table.
        table: &'static str,
        /// Record id.
        id: String,
        /// Stored status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },

    /// Update that touches more than status, spend or position.
    #[error("{table} record {id}: only status, spend and position may change")]
    ImmutableField {
        /// Store table.
        table: &'static str,
        /// Record id.
        id: String,
    },

    /// Signing digest is not a canonical field element.
    #[error("message digest {0} is not below the field modulus")]
    FieldOverflow(Hash32),

    /// Receipt lacks the event that carries authoritative positions.
    #[error("receipt {tx_hash} has no matching {event} event")]
    ReceiptDecodeFailure {
        /// Transaction whose receipt was decoded.
        tx_hash: Hash32,
        /// Event that was expected.
        event: &'static str,
    },

    /// Local reconstruction disagrees with what the indexer reported.
    #[error("{kind:?} tree {tree_id} out of sync: {reason}")]
    TreeDesync {
        /// Which tree.
        kind: TreeKind,
        /// Tree index.
        tree_id: u64,
        /// What disagreed.
        reason: String,
    },

    /// Outputs do not add up to inputs.
    #[error("value not conserved: inputs {inputs}, outputs {outputs}")]
    ConservationViolated {
        /// Sum of inputs.
        inputs: Amount,
        /// Sum of outputs.
        outputs: Amount,
    },

    /// The chain rejected the transaction.
    #[error("transaction {0} reverted")]
    TransactionReverted(Hash32),

    /// Caller input rejected before any work.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Key generation, decryption or recovery failed.
    #[error("key error: {0}")]
    Key(String),

    /// An injected service (indexer, prover, signer, relayer) failed.
    #[error("{capability} failed: {message}")]
    Capability {
        /// Service name.
        capability: &'static str,
        /// Its error, rendered.
        message: String,
    },

    /// Embedded database failure.
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    /// Borsh encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] std::io::Error),

    /// JSON encoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tree or projection failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// Primitive failure, such as amount overflow.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl WalletError {
    pub(crate) fn capability(capability: &'static str, err: impl std::fmt::Display) -> Self {
        WalletError::Capability {
            capability,
            message: err.to_string(),
        }
    }
}
