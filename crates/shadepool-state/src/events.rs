//! Decoded pool-contract events.
//!
//! ABI decoding happens at the chain adapter; everything downstream works on
//! these typed values. JSON is tagged by `type` so event logs can be stored as
//! JSON lines.

use borsh::{BorshDeserialize, BorshSerialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use shadepool_core::{Address, Amount, Fr, Hash32, Withdrawal};

/// Which of the two accumulators a tree id refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TreeKind {
    /// Shielded note commitments.
    Shielded,
    /// Screened bridge deposits.
    Wormhole,
}

/// Where an event sits in the chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventMeta {
    /// Block the event was emitted in.
    pub block_number: u64,
    /// Block timestamp, unix seconds.
    pub block_timestamp: u64,
    /// Emitting transaction.
    pub tx_hash: Hash32,
    /// Position of the log within its block.
    pub log_index: u64,
}

impl EventMeta {
    /// Total-order key: `(block_number, log_index)`.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// An event the pool contract can emit.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ChainEvent {
    /// A wrapped-asset pool was deployed.
    PoolCreated {
        /// Pool contract.
        pool: Address,
        /// Implementation it proxies to.
        implementation: Address,
        /// Underlying asset.
        asset: Address,
        /// Initializer calldata.
        init_data: Vec<u8>,
    },
    /// A pool implementation was (un)approved.
    PoolImplementationSet {
        /// Implementation contract.
        implementation: Address,
        /// New approval flag.
        is_approved: bool,
    },
    /// A proof verifier was registered for an input/output arity.
    VerifierAdded {
        /// Verifier contract.
        verifier: Address,
        /// Number of shielded inputs.
        inputs: u8,
        /// Number of outputs.
        outputs: u8,
    },
    /// A screening approver was added or removed.
    WormholeApproverSet {
        /// Approver account.
        approver: Address,
        /// New flag.
        is_approver: bool,
    },
    /// Funds arrived at a burn address.
    WormholeEntry {
        /// Sequential entry id.
        entry_id: u64,
        /// Token deposited.
        token: Address,
        /// Depositor.
        from: Address,
        /// Burn address that received the funds.
        to: Address,
        /// Token id (zero for fungible tokens).
        #[cfg_attr(feature = "serde", serde(with = "shadepool_core::serialization::decimal_u128"))]
        token_id: u128,
        /// Deposited value.
        amount: Amount,
    },
    /// A screened entry was appended to a wormhole tree.
    WormholeCommitment {
        /// Entry being screened.
        entry_id: u64,
        /// Burn commitment leaf.
        commitment: Fr,
        /// Wormhole tree id.
        tree_id: u64,
        /// Position of the leaf.
        leaf_index: u64,
        /// Asset id of the deposit.
        asset_id: Fr,
        /// Depositor.
        from: Address,
        /// Burn address.
        to: Address,
        /// Deposited value.
        amount: Amount,
        /// Screening verdict.
        approved: bool,
    },
    /// A shielded transfer settled.
    ShieldedTransfer {
        /// Shielded tree id the outputs were appended to.
        tree_id: u64,
        /// Position of the first output.
        start_index: u64,
        /// Output commitments in order.
        commitments: Vec<Fr>,
        /// Input nullifiers.
        nullifiers: Vec<Fr>,
        /// Public payouts.
        withdrawals: Vec<Withdrawal>,
    },
    /// A bridge (or pseudo) nullifier was consumed.
    WormholeNullifier {
        /// The nullifier.
        nullifier: Fr,
    },
    /// A depositor reclaimed an entry.
    Ragequit {
        /// Entry reclaimed.
        entry_id: u64,
        /// Caller.
        quitter: Address,
        /// Account the funds went back to.
        returned_to: Address,
        /// Token returned.
        asset: Address,
        /// Token id.
        #[cfg_attr(feature = "serde", serde(with = "shadepool_core::serialization::decimal_u128"))]
        token_id: u128,
        /// Returned value.
        amount: Amount,
    },
    /// The signing domain changed.
    Eip712DomainChanged,
    /// Contract ownership moved.
    OwnershipTransferred {
        /// Previous owner.
        previous_owner: Address,
        /// New owner.
        new_owner: Address,
    },
}

impl ChainEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChainEvent::PoolCreated { .. } => "PoolCreated",
            ChainEvent::PoolImplementationSet { .. } => "PoolImplementationSet",
            ChainEvent::VerifierAdded { .. } => "VerifierAdded",
            ChainEvent::WormholeApproverSet { .. } => "WormholeApproverSet",
            ChainEvent::WormholeEntry { .. } => "WormholeEntry",
            ChainEvent::WormholeCommitment { .. } => "WormholeCommitment",
            ChainEvent::ShieldedTransfer { .. } => "ShieldedTransfer",
            ChainEvent::WormholeNullifier { .. } => "WormholeNullifier",
            ChainEvent::Ragequit { .. } => "Ragequit",
            ChainEvent::Eip712DomainChanged => "EIP712DomainChanged",
            ChainEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}

/// An event together with its chain position.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoggedEvent {
    /// Chain position.
    pub meta: EventMeta,
    /// Decoded payload.
    pub event: ChainEvent,
}
