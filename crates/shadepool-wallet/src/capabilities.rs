//! External services a [`crate::ShieldedPool`] session talks to.
//!
//! Each one is an injected trait object so tests can swap in fakes and the
//! pipeline never reaches for a global client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use shadepool_core::{Address, Fr, Hash32};
use shadepool_state::{EntryRecord, TreeKind, TreeSnapshot};

use crate::circuit::{CircuitInputs, RagequitInputs};
use crate::error::WalletError;
use crate::message::ShieldedTxMessage;
use crate::receipt::Receipt;
use crate::signer::{recover_public_key, PublicKey, RecoverableSignature};

/// Proof bytes plus the public inputs the prover committed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Serialized proof.
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    /// Public inputs in circuit order.
    pub public_inputs: Vec<Fr>,
}

/// Read access to projected chain state.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// `None` when no leaf was ever appended to that tree id.
    async fn tree(&self, kind: TreeKind, tree_id: u64) -> Result<Option<TreeSnapshot>, WalletError>;

    /// Entries by id. Unknown ids are skipped.
    async fn entries(&self, ids: &[u64]) -> Result<Vec<EntryRecord>, WalletError>;

    /// Entries whose depositor or burn address is `address`.
    async fn entries_by_address(&self, address: Address) -> Result<Vec<EntryRecord>, WalletError>;
}

/// Generates and checks transfer proofs.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Prove a transfer witness.
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof, WalletError>;
    /// Check a proof against its public inputs.
    async fn verify(&self, proof: &Proof) -> Result<bool, WalletError>;
}

/// Generates ragequit proofs.
#[async_trait]
pub trait RagequitProver: Send + Sync {
    /// Prove a ragequit witness.
    async fn prove_ragequit(&self, inputs: &RagequitInputs) -> Result<Proof, WalletError>;
}

/// Holds the account key.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account the key controls.
    fn address(&self) -> Address;

    /// Sign a 32-byte prehashed digest.
    async fn sign(&self, digest: Hash32) -> Result<RecoverableSignature, WalletError>;

    /// Public key that produced `sig` over `digest`.
    fn recover_public_key(
        &self,
        digest: &Hash32,
        sig: &RecoverableSignature,
    ) -> Result<PublicKey, WalletError> {
        recover_public_key(digest, sig)
    }
}

/// Broadcasts pool transactions.
#[async_trait]
pub trait Relayer: Send + Sync {
    /// Submit a proven transfer; returns the transaction hash.
    async fn submit(&self, message: &ShieldedTxMessage, proof: &Proof) -> Result<Hash32, WalletError>;
    /// Submit a proven ragequit; returns the transaction hash.
    async fn submit_ragequit(&self, entry_id: u64, proof: &Proof) -> Result<Hash32, WalletError>;
    /// Block until `tx_hash` is mined.
    async fn await_receipt(&self, tx_hash: Hash32) -> Result<Receipt, WalletError>;
}

/// Everything a session needs from the outside world.
#[derive(Clone)]
pub struct Capabilities {
    /// Chain state reader.
    pub indexer: Arc<dyn Indexer>,
    /// Transfer prover.
    pub prover: Arc<dyn Prover>,
    /// Ragequit prover.
    pub ragequit_prover: Arc<dyn RagequitProver>,
    /// Account key.
    pub signer: Arc<dyn Signer>,
    /// Transaction relay.
    pub relayer: Arc<dyn Relayer>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
