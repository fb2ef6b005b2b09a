//! Bridge entries from the depositor's side: burn addresses, recording the
//! funding receipt, and following screening outcomes.

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use shadepool_core::{wormhole_burn_address, Address, Fr};
use shadepool_state::{EntryRecord, EntryState, TreeKind};

use crate::capabilities::Indexer;
use crate::error::WalletError;
use crate::receipt::Receipt;
use crate::store::{EntryPosition, EntryStatus, NoteStore, WormholeEntryRecord};

/// Secret material for a bridge deposit, before funds are sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WormholeDeposit {
    /// Account the entry will belong to.
    pub recipient: Address,
    /// Secret behind the burn address.
    pub secret: Fr,
    /// Address to fund.
    pub burn_address: Address,
}

impl WormholeDeposit {
    /// Fresh secret and the burn address it yields for `recipient`.
    pub fn generate<R: RngCore + CryptoRng>(recipient: Address, rng: &mut R) -> Self {
        Self::from_secret(recipient, Fr::random(rng))
    }

    /// Deposit for an already chosen secret.
    pub fn from_secret(recipient: Address, secret: Fr) -> Self {
        Self {
            recipient,
            secret,
            burn_address: wormhole_burn_address(recipient, secret),
        }
    }
}

/// Outcome of an entry sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries that became spendable.
    pub approved: usize,
    /// Entries the screener rejected.
    pub rejected: usize,
    /// Entries already ragequitted on chain.
    pub ragequitted: usize,
    /// Entries with no new status.
    pub unchanged: usize,
    /// Entries whose opening no longer matches the indexer.
    pub mismatched: usize,
}

/// Record the entry created by funding `deposit.burn_address` as pending.
pub fn record_entry(
    store: &NoteStore,
    chain_id: u64,
    receipt: &Receipt,
    deposit: &WormholeDeposit,
) -> Result<WormholeEntryRecord, WalletError> {
    let log = receipt.wormhole_entry(deposit.burn_address)?;
    let record = WormholeEntryRecord {
        entry_id: log.entry_id,
        chain_id,
        recipient: deposit.recipient,
        sender: log.from,
        burn_address: deposit.burn_address,
        secret: deposit.secret,
        token: log.token,
        token_id: log.token_id,
        amount: log.amount,
        status: EntryStatus::Pending,
        position: None,
        used_in: None,
    };
    store.insert_entry(&record)?;
    info!(entry = record.entry_id, amount = %record.amount, "recorded wormhole entry");
    Ok(record)
}

/// Pull screening and ragequit outcomes for entries still in flight.
pub async fn sync_entries(
    store: &NoteStore,
    indexer: &dyn Indexer,
    chain_id: u64,
) -> Result<SyncReport, WalletError> {
    let tracked: Vec<WormholeEntryRecord> = store
        .entries()?
        .into_iter()
        .filter(|e| {
            e.chain_id == chain_id
                && matches!(
                    e.status,
                    EntryStatus::Pending | EntryStatus::Approved | EntryStatus::Rejected
                )
        })
        .collect();
    let mut report = SyncReport::default();
    if tracked.is_empty() {
        return Ok(report);
    }
    let ids: Vec<u64> = tracked.iter().map(|e| e.entry_id).collect();
    let remote = indexer.entries(&ids).await?;

    for local in &tracked {
        let Some(chain) = remote.iter().find(|r| r.entry_id == local.entry_id) else {
            report.unchanged += 1;
            continue;
        };
        if !entry_matches(local, chain) {
            warn!(entry = local.entry_id, "indexer entry does not match local record");
            report.mismatched += 1;
            continue;
        }
        match advance_entry(store, local, chain)? {
            Some(EntryStatus::Approved) => report.approved += 1,
            Some(EntryStatus::Rejected) => report.rejected += 1,
            Some(EntryStatus::Ragequitted) | Some(EntryStatus::Completed) => {
                report.ragequitted += 1
            }
            _ => report.unchanged += 1,
        }
    }
    info!(?report, "synced wormhole entries");
    Ok(report)
}

fn advance_entry(
    store: &NoteStore,
    local: &WormholeEntryRecord,
    chain: &EntryRecord,
) -> Result<Option<EntryStatus>, WalletError> {
    let next = match (local.status, chain.state) {
        (EntryStatus::Pending, EntryState::Approved) => EntryStatus::Approved,
        (EntryStatus::Pending, EntryState::Rejected) => EntryStatus::Rejected,
        (EntryStatus::Pending | EntryStatus::Approved, EntryState::Ragequitted) => {
            EntryStatus::Ragequitted
        }
        (EntryStatus::Rejected, EntryState::Ragequitted) => EntryStatus::Completed,
        _ => return Ok(None),
    };
    let screened = matches!(next, EntryStatus::Approved | EntryStatus::Rejected);
    if let (Some(placement), true) = (chain.placement, screened) {
        let expected = local.expected_commitment(next == EntryStatus::Approved);
        if placement.commitment != expected {
            return Err(WalletError::TreeDesync {
                kind: TreeKind::Wormhole,
                tree_id: placement.tree_id,
                reason: format!(
                    "entry {} leaf {} does not commit to the recorded deposit",
                    local.entry_id, placement.leaf_index
                ),
            });
        }
    }
    let position = chain.placement.map(|p| EntryPosition {
        tree_id: p.tree_id,
        leaf_index: p.leaf_index,
    });
    store.set_entry_status(local.entry_id, next, position)?;
    debug!(entry = local.entry_id, status = next.as_str(), "entry advanced");
    Ok(Some(next))
}

fn entry_matches(local: &WormholeEntryRecord, chain: &EntryRecord) -> bool {
    chain.to == local.burn_address
        && chain.token == local.token
        && chain.token_id == local.token_id
        && chain.amount == local.amount
        && chain.from == local.sender
}
