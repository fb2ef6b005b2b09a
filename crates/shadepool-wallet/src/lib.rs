#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shadepool wallet: the per-account note store, coin selection, witness
//! construction and the session that drives a transfer from selection to
//! confirmed receipt.

pub mod builder;
pub mod capabilities;
pub mod circuit;
pub mod entries;
pub mod error;
pub mod keystore;
pub mod message;
pub mod pool;
pub mod receipt;
pub mod rpc_client;
pub mod selection;
pub mod signer;
pub mod store;

pub use builder::{
    build_transfer, check_conservation, BridgeContext, BridgeInput, BuildParams, PreparedInput,
    TransferRequest, TreeView, UnsignedTransfer,
};
pub use capabilities::{Capabilities, Indexer, Proof, Prover, RagequitProver, Relayer, Signer};
pub use circuit::{CircuitInputs, NoirOption, PublicInputs, RagequitInputs, RagequitPublicInputs};
pub use entries::{record_entry, sync_entries, SyncReport, WormholeDeposit};
pub use error::WalletError;
pub use keystore::KeyStore;
pub use message::{Eip712Domain, ShieldedTxMessage};
pub use pool::{
    ConfirmedTransfer, PoolConfig, PreparedRagequit, PreparedTransfer, ProvenTransfer,
    ShieldedPool,
};
pub use receipt::{Receipt, ReceiptStatus};
pub use rpc_client::RpcClient;
pub use selection::{select_inputs, Selection, SelectionRequest};
pub use signer::{recover_public_key, LocalSigner, PublicKey, RecoverableSignature};
pub use store::{
    BalanceSummary, ConfirmationBatch, EntryPosition, EntryStatus, NoteStatus, NoteStore,
    ShieldedNoteRecord, WormholeEntryRecord,
};
