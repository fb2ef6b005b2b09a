//! Read-side records produced by the projector.
//!
//! These are also the wire shapes the indexer serves, so the wallet and the
//! indexer agree on them without a second schema.

use borsh::{BorshDeserialize, BorshSerialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use shadepool_core::{Address, Amount, Fr, Hash32, Withdrawal};

use crate::events::EventMeta;

/// Chain-visible lifecycle of a bridge entry.
///
/// `Completed` is not observable here: a consumed entry publishes a nullifier
/// that cannot be linked back to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntryState {
    /// Deposited, not yet screened.
    Pending,
    /// Screened in; spendable.
    Approved,
    /// Screened out.
    Rejected,
    /// Reclaimed by the depositor.
    Ragequitted,
}

impl EntryState {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Approved => "approved",
            EntryState::Rejected => "rejected",
            EntryState::Ragequitted => "ragequitted",
        }
    }
}

/// Where a screened entry landed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryPlacement {
    /// Burn commitment leaf.
    pub commitment: Fr,
    /// Wormhole tree id.
    pub tree_id: u64,
    /// Leaf position.
    pub leaf_index: u64,
    /// Asset id reported with the commitment.
    pub asset_id: Fr,
}

/// A bridge entry as seen on chain.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryRecord {
    /// Sequential entry id.
    pub entry_id: u64,
    /// Token deposited.
    pub token: Address,
    /// Depositor.
    pub from: Address,
    /// Burn address.
    pub to: Address,
    /// Token id.
    #[cfg_attr(feature = "serde", serde(with = "shadepool_core::serialization::decimal_u128"))]
    pub token_id: u128,
    /// Deposited value.
    pub amount: Amount,
    /// Current state.
    pub state: EntryState,
    /// Set once screened.
    pub placement: Option<EntryPlacement>,
    /// Block timestamp of the deposit.
    pub created_at: u64,
    /// Deposit transaction.
    pub tx_hash: Hash32,
}

/// A tree as served to wallets.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeSnapshot {
    /// Tree id.
    pub tree_id: u64,
    /// Leaves in insertion order.
    pub leaves: Vec<Fr>,
    /// Root over `leaves`.
    pub root: Fr,
    /// Number of leaves.
    pub size: u64,
    /// Timestamp of the first append.
    pub created_at: u64,
    /// Timestamp of the latest append.
    pub updated_at: u64,
}

/// A public payout recorded by a shielded transfer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WithdrawalRecord {
    /// Shielded tree the transfer settled against.
    pub tree_id: u64,
    /// Position of the payout within its transfer.
    pub position: u32,
    /// Payout.
    pub withdrawal: Withdrawal,
    /// Chain position of the transfer.
    pub meta: EventMeta,
}

/// A deployed pool.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolRecord {
    /// Pool contract.
    pub pool: Address,
    /// Implementation it proxies to.
    pub implementation: Address,
    /// Underlying asset.
    pub asset: Address,
    /// Initializer calldata.
    pub init_data: Vec<u8>,
    /// Block the pool was created in.
    pub start_block: u64,
    /// Creation timestamp.
    pub created_at: u64,
}

/// Aggregate counters for status endpoints.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectorStats {
    /// Events applied.
    pub events: u64,
    /// Shielded tree ids seen.
    pub shielded_trees: u64,
    /// Wormhole tree ids seen.
    pub wormhole_trees: u64,
    /// Bridge entries known.
    pub entries: u64,
    /// Shielded nullifiers spent.
    pub spent: u64,
    /// Bridge nullifiers spent.
    pub wormhole_spent: u64,
    /// Chain position of the last applied event.
    pub last_block: Option<u64>,
}
