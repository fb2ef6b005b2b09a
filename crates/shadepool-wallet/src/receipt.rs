//! Transaction receipts as the relayer reports them.
//!
//! Logs arrive already decoded into [`ChainEvent`]s. Anything the wallet
//! persists after a submission is read from here, never from what it sent.

use serde::{Deserialize, Serialize};

use shadepool_core::{Address, Amount, Fr, Hash32, Withdrawal};
use shadepool_state::{ChainEvent, LoggedEvent};

use crate::error::WalletError;

/// Execution outcome.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Transaction executed.
    Success,
    /// Transaction reverted; its logs are ignored.
    Reverted,
}

/// A mined transaction and its decoded logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub tx_hash: Hash32,
    /// Block it was mined in.
    pub block_number: u64,
    /// Execution outcome.
    pub status: ReceiptStatus,
    /// Decoded logs in emission order.
    pub events: Vec<LoggedEvent>,
}

/// Decoded `ShieldedTransfer` log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferLog {
    /// Tree the commitments were appended to.
    pub tree_id: u64,
    /// Leaf index of the first commitment.
    pub start_index: u64,
    /// Appended commitments.
    pub commitments: Vec<Fr>,
    /// Published nullifiers.
    pub nullifiers: Vec<Fr>,
    /// Public payouts.
    pub withdrawals: Vec<Withdrawal>,
}

/// Decoded `WormholeEntry` log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryLog {
    /// Indexer id of the entry.
    pub entry_id: u64,
    /// Token contract.
    pub token: Address,
    /// Depositor.
    pub from: Address,
    /// Burn address.
    pub to: Address,
    /// Token id within the contract.
    pub token_id: u128,
    /// Deposited amount.
    pub amount: Amount,
}

impl Receipt {
    /// Fails unless the transaction succeeded.
    pub fn ensure_success(&self) -> Result<(), WalletError> {
        match self.status {
            ReceiptStatus::Success => Ok(()),
            ReceiptStatus::Reverted => Err(WalletError::TransactionReverted(self.tx_hash)),
        }
    }

    /// The `ShieldedTransfer` log carrying exactly `nullifiers`.
    pub fn shielded_transfer(&self, nullifiers: &[Fr]) -> Result<TransferLog, WalletError> {
        self.ensure_success()?;
        self.events
            .iter()
            .find_map(|ev| match &ev.event {
                ChainEvent::ShieldedTransfer {
                    tree_id,
                    start_index,
                    commitments,
                    nullifiers: logged,
                    withdrawals,
                } if logged.as_slice() == nullifiers => Some(TransferLog {
                    tree_id: *tree_id,
                    start_index: *start_index,
                    commitments: commitments.clone(),
                    nullifiers: logged.clone(),
                    withdrawals: withdrawals.clone(),
                }),
                _ => None,
            })
            .ok_or(WalletError::ReceiptDecodeFailure {
                tx_hash: self.tx_hash,
                event: "ShieldedTransfer",
            })
    }

    /// The `WormholeEntry` log paying into `burn_address`.
    pub fn wormhole_entry(&self, burn_address: Address) -> Result<EntryLog, WalletError> {
        self.ensure_success()?;
        self.events
            .iter()
            .find_map(|ev| match ev.event {
                ChainEvent::WormholeEntry {
                    entry_id,
                    token,
                    from,
                    to,
                    token_id,
                    amount,
                } if to == burn_address => Some(EntryLog {
                    entry_id,
                    token,
                    from,
                    to,
                    token_id,
                    amount,
                }),
                _ => None,
            })
            .ok_or(WalletError::ReceiptDecodeFailure {
                tx_hash: self.tx_hash,
                event: "WormholeEntry",
            })
    }

    /// Whether the receipt carries a `Ragequit` for `entry_id`.
    pub fn ragequit(&self, entry_id: u64) -> Result<(), WalletError> {
        self.ensure_success()?;
        let found = self.events.iter().any(|ev| {
            matches!(ev.event, ChainEvent::Ragequit { entry_id: id, .. } if id == entry_id)
        });
        if found {
            Ok(())
        } else {
            Err(WalletError::ReceiptDecodeFailure {
                tx_hash: self.tx_hash,
                event: "Ragequit",
            })
        }
    }
}
