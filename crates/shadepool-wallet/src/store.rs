//! Per-account note store.
//!
//! Two sled trees per account, `<account>/shielded_note` and
//! `<account>/wormhole_note`, each keyed by record id and holding
//! Borsh-encoded records. Inserts never overwrite and updates never create.
//! An update may only move status forward, record the spending transaction
//! and, for entries, record the tree position.

use std::path::Path;

use borsh::{BorshDeserialize, BorshSerialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    Transactional, TransactionalTree,
};
use tracing::debug;

use shadepool_core::{
    asset_id, commitment_for, wormhole_burn_commitment, Address, Amount, Fr, Hash32,
    TransferKind, WormholeNote,
};

use crate::error::WalletError;

const SHIELDED_TABLE: &str = "shielded_note";
const WORMHOLE_TABLE: &str = "wormhole_note";

/// Spendability of a shielded note.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub enum NoteStatus {
    /// Spendable.
    Available,
    /// Spent by a confirmed transfer.
    Used,
}

impl NoteStatus {
    /// Name used in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            NoteStatus::Available => "available",
            NoteStatus::Used => "used",
        }
    }

    fn can_become(self, next: NoteStatus) -> bool {
        matches!((self, next), (NoteStatus::Available, NoteStatus::Used))
    }
}

/// Local lifecycle of a bridge entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub enum EntryStatus {
    /// Awaiting screening.
    Pending,
    /// Screened in and spendable.
    Approved,
    /// Screened out; only a ragequit remains.
    Rejected,
    /// Consumed by a transfer or ragequit.
    Completed,
    /// Withdrawn through a ragequit.
    Ragequitted,
}

impl EntryStatus {
    /// Name used in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
            EntryStatus::Completed => "completed",
            EntryStatus::Ragequitted => "ragequitted",
        }
    }

    /// `pending -> approved | rejected | ragequitted`,
    /// `approved -> completed | ragequitted`, `rejected -> completed`.
    pub fn can_become(self, next: EntryStatus) -> bool {
        use EntryStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Ragequitted)
                | (Approved, Completed)
                | (Approved, Ragequitted)
                | (Rejected, Completed)
        )
    }
}

/// A shielded note this wallet knows the opening of.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct ShieldedNoteRecord {
    /// Chain the note lives on.
    pub chain_id: u64,
    /// Shielded tree index.
    pub tree_id: u64,
    /// Real position in the tree (not the compressed proof index).
    pub leaf_index: u64,
    /// Account that can spend the note.
    pub owner: Address,
    /// Token contract.
    pub token: Address,
    /// Token id within the contract.
    pub token_id: u128,
    /// Commitment blinding.
    pub blinding: Fr,
    /// Note amount.
    pub amount: Amount,
    /// Leaf value in the tree.
    pub commitment: Fr,
    /// Spendability.
    pub status: NoteStatus,
    /// Transaction that created the note.
    pub created_in: Hash32,
    /// Transaction that spent it.
    pub used_in: Option<Hash32>,
}

impl ShieldedNoteRecord {
    /// `chainId:treeId:leafIndex`.
    pub fn id(&self) -> String {
        note_id(self.chain_id, self.tree_id, self.leaf_index)
    }

    /// Field identifier of the note's asset.
    pub fn asset_id(&self) -> Fr {
        asset_id(self.token, self.token_id)
    }

    /// Equal in everything but status and spend.
    fn same_opening(&self, other: &ShieldedNoteRecord) -> bool {
        let mut other = other.clone();
        other.status = self.status;
        other.used_in = self.used_in;
        *self == other
    }

    /// Commitment recomputed from the opening.
    pub fn expected_commitment(&self) -> Fr {
        commitment_for(
            self.owner,
            self.blinding,
            self.asset_id(),
            self.amount,
            TransferKind::Transfer,
        )
    }
}

/// Store id of the note at `leaf_index`.
pub fn note_id(chain_id: u64, tree_id: u64, leaf_index: u64) -> String {
    format!("{chain_id}:{tree_id}:{leaf_index}")
}

/// Where a screened entry landed in the wormhole tree.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct EntryPosition {
    /// Wormhole tree index.
    pub tree_id: u64,
    /// Leaf position.
    pub leaf_index: u64,
}

/// A bridge deposit this wallet made or is the recipient of.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct WormholeEntryRecord {
    /// Indexer id of the entry.
    pub entry_id: u64,
    /// Chain the entry lives on.
    pub chain_id: u64,
    /// Burn address owner.
    pub recipient: Address,
    /// Depositor.
    pub sender: Address,
    /// Address that was funded.
    pub burn_address: Address,
    /// Secret behind `burn_address`.
    pub secret: Fr,
    /// Token contract.
    pub token: Address,
    /// Token id within the contract.
    pub token_id: u128,
    /// Deposited amount.
    pub amount: Amount,
    /// Local lifecycle.
    pub status: EntryStatus,
    /// Set once the screener appends the entry.
    pub position: Option<EntryPosition>,
    /// Transaction that consumed it.
    pub used_in: Option<Hash32>,
}

impl WormholeEntryRecord {
    /// Store id: the entry id in decimal.
    pub fn id(&self) -> String {
        self.entry_id.to_string()
    }

    /// Opening of the burn commitment.
    pub fn note(&self) -> WormholeNote {
        WormholeNote {
            recipient: self.recipient,
            sender: self.sender,
            secret: self.secret,
            asset_id: asset_id(self.token, self.token_id),
            amount: self.amount,
        }
    }

    /// Leaf the screener should have appended for this entry.
    pub fn expected_commitment(&self, approved: bool) -> Fr {
        wormhole_burn_commitment(&self.note(), approved)
    }

    /// Equal in everything but status, spend and position.
    fn same_opening(&self, other: &WormholeEntryRecord) -> bool {
        let mut other = other.clone();
        other.status = self.status;
        other.used_in = self.used_in;
        other.position = self.position;
        *self == other
    }

    /// Approved and not yet consumed by a transfer.
    pub fn is_spendable(&self) -> bool {
        self.status == EntryStatus::Approved && self.used_in.is_none() && self.position.is_some()
    }
}

/// Balance split by source.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BalanceSummary {
    /// Available shielded notes.
    pub shielded: Amount,
    /// Approved, unconsumed bridge entries.
    pub bridged: Amount,
}

impl BalanceSummary {
    /// Sum of both sources.
    pub fn total(&self) -> Result<Amount, WalletError> {
        Ok(self.shielded.checked_add(self.bridged)?)
    }
}

/// Everything a confirmed transfer changes, applied in one transaction.
#[derive(Clone, Debug)]
pub struct ConfirmationBatch {
    /// Confirmed transaction.
    pub tx_hash: Hash32,
    /// Store ids of the notes it spent.
    pub spent_notes: Vec<String>,
    /// Store id of the entry it consumed.
    pub consumed_entry: Option<String>,
    /// Notes it created for this account.
    pub new_notes: Vec<ShieldedNoteRecord>,
}

/// Sled-backed note and entry tables of one account.
pub struct NoteStore {
    account: Address,
    notes: sled::Tree,
    entries: sled::Tree,
}

impl NoteStore {
    /// Open the database at `path` and scope it to `account`.
    pub fn open(path: &Path, account: Address) -> Result<Self, WalletError> {
        let db = sled::open(path)?;
        Self::with_db(&db, account)
    }

    /// Scope a store to `account` inside an already-open database.
    pub fn with_db(db: &sled::Db, account: Address) -> Result<Self, WalletError> {
        let notes = db.open_tree(format!("{account}/{SHIELDED_TABLE}"))?;
        let entries = db.open_tree(format!("{account}/{WORMHOLE_TABLE}"))?;
        Ok(Self {
            account,
            notes,
            entries,
        })
    }

    /// Account the tables belong to.
    pub fn account(&self) -> Address {
        self.account
    }

    // ---- shielded notes ----

    /// Insert one note. Fails if its id exists.
    pub fn insert_note(&self, record: &ShieldedNoteRecord) -> Result<(), WalletError> {
        self.insert_notes(std::slice::from_ref(record))
    }

    /// Insert all or nothing. Every id is checked before anything is written.
    pub fn insert_notes(&self, records: &[ShieldedNoteRecord]) -> Result<(), WalletError> {
        let encoded = encode_all(records, |r| r.id())?;
        let res = self.notes.transaction(|tx| {
            for (id, _) in &encoded {
                ensure_absent(tx, SHIELDED_TABLE, id)?;
            }
            for (id, bytes) in &encoded {
                tx.insert(id.as_bytes(), bytes.clone())?;
            }
            Ok(())
        });
        finish(res)?;
        debug!(count = records.len(), "stored shielded notes");
        Ok(())
    }

    /// Replace a note. Only status and spend may change, and only forwards.
    pub fn update_note(&self, record: &ShieldedNoteRecord) -> Result<(), WalletError> {
        let id = record.id();
        let bytes = borsh::to_vec(record)?;
        let next = record.status;
        let res = self.notes.transaction(|tx| {
            let current: ShieldedNoteRecord = load(tx, SHIELDED_TABLE, &id)?;
            if !current.same_opening(record) {
                return abort(WalletError::ImmutableField {
                    table: SHIELDED_TABLE,
                    id: id.clone(),
                });
            }
            if current.status != next && !current.status.can_become(next) {
                return abort(WalletError::InvalidTransition {
                    table: SHIELDED_TABLE,
                    id: id.clone(),
                    from: current.status.as_str(),
                    to: next.as_str(),
                });
            }
            tx.insert(id.as_bytes(), bytes.clone())?;
            Ok(())
        });
        finish(res)
    }

    /// Note by store id.
    pub fn get_note(&self, id: &str) -> Result<Option<ShieldedNoteRecord>, WalletError> {
        match self.notes.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(ShieldedNoteRecord::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every note, ordered by id.
    pub fn notes(&self) -> Result<Vec<ShieldedNoteRecord>, WalletError> {
        let mut out = Vec::new();
        for item in self.notes.iter() {
            let (_, v) = item?;
            out.push(ShieldedNoteRecord::try_from_slice(&v)?);
        }
        Ok(out)
    }

    /// Returns whether a record was removed.
    pub fn delete_note(&self, id: &str) -> Result<bool, WalletError> {
        Ok(self.notes.remove(id.as_bytes())?.is_some())
    }

    // ---- wormhole entries ----

    /// Insert one entry. Fails if its id exists.
    pub fn insert_entry(&self, record: &WormholeEntryRecord) -> Result<(), WalletError> {
        self.insert_entries(std::slice::from_ref(record))
    }

    /// Insert all or nothing. Every id is checked before anything is written.
    pub fn insert_entries(&self, records: &[WormholeEntryRecord]) -> Result<(), WalletError> {
        let encoded = encode_all(records, |r| r.id())?;
        let res = self.entries.transaction(|tx| {
            for (id, _) in &encoded {
                ensure_absent(tx, WORMHOLE_TABLE, id)?;
            }
            for (id, bytes) in &encoded {
                tx.insert(id.as_bytes(), bytes.clone())?;
            }
            Ok(())
        });
        finish(res)?;
        debug!(count = records.len(), "stored wormhole entries");
        Ok(())
    }

    /// Replace an entry. Only status, spend and position may change, and status only forwards.
    pub fn update_entry(&self, record: &WormholeEntryRecord) -> Result<(), WalletError> {
        let id = record.id();
        let bytes = borsh::to_vec(record)?;
        let next = record.status;
        let res = self.entries.transaction(|tx| {
            let current: WormholeEntryRecord = load(tx, WORMHOLE_TABLE, &id)?;
            if !current.same_opening(record) {
                return abort(WalletError::ImmutableField {
                    table: WORMHOLE_TABLE,
                    id: id.clone(),
                });
            }
            if current.status != next && !current.status.can_become(next) {
                return abort(WalletError::InvalidTransition {
                    table: WORMHOLE_TABLE,
                    id: id.clone(),
                    from: current.status.as_str(),
                    to: next.as_str(),
                });
            }
            tx.insert(id.as_bytes(), bytes.clone())?;
            Ok(())
        });
        finish(res)
    }

    /// Move an entry to `next`, optionally recording where it landed.
    pub fn set_entry_status(
        &self,
        entry_id: u64,
        next: EntryStatus,
        position: Option<EntryPosition>,
    ) -> Result<WormholeEntryRecord, WalletError> {
        let id = entry_id.to_string();
        let mut record = self
            .get_entry(entry_id)?
            .ok_or_else(|| WalletError::MissingRecord {
                table: WORMHOLE_TABLE,
                id: id.clone(),
            })?;
        if !record.status.can_become(next) {
            return Err(WalletError::InvalidTransition {
                table: WORMHOLE_TABLE,
                id,
                from: record.status.as_str(),
                to: next.as_str(),
            });
        }
        record.status = next;
        if position.is_some() {
            record.position = position;
        }
        self.update_entry(&record)?;
        Ok(record)
    }

    /// Entry by id.
    pub fn get_entry(&self, entry_id: u64) -> Result<Option<WormholeEntryRecord>, WalletError> {
        match self.entries.get(entry_id.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(WormholeEntryRecord::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every entry, ordered by entry id.
    pub fn entries(&self) -> Result<Vec<WormholeEntryRecord>, WalletError> {
        let mut out = Vec::new();
        for item in self.entries.iter() {
            let (_, v) = item?;
            out.push(WormholeEntryRecord::try_from_slice(&v)?);
        }
        out.sort_by_key(|e| e.entry_id);
        Ok(out)
    }

    /// Returns whether a record was removed.
    pub fn delete_entry(&self, entry_id: u64) -> Result<bool, WalletError> {
        Ok(self.entries.remove(entry_id.to_string().as_bytes())?.is_some())
    }

    // ---- aggregate ----

    /// Spendable value of one asset for this account, by source. Bridge
    /// entries are counted once each, and only while unconsumed.
    pub fn balance(
        &self,
        chain_id: u64,
        token: Address,
        token_id: u128,
    ) -> Result<BalanceSummary, WalletError> {
        let shielded = Amount::checked_sum(
            self.notes()?
                .into_iter()
                .filter(|n| {
                    n.status == NoteStatus::Available
                        && n.chain_id == chain_id
                        && n.owner == self.account
                        && n.token == token
                        && n.token_id == token_id
                })
                .map(|n| n.amount),
        )?;
        let bridged = Amount::checked_sum(
            self.entries()?
                .into_iter()
                .filter(|e| {
                    e.is_spendable()
                        && e.chain_id == chain_id
                        && e.recipient == self.account
                        && e.token == token
                        && e.token_id == token_id
                })
                .map(|e| e.amount),
        )?;
        Ok(BalanceSummary { shielded, bridged })
    }

    /// Persist a confirmed transfer atomically: spent notes become used, the
    /// consumed entry completes, and new notes are inserted.
    pub fn apply_confirmation(&self, batch: &ConfirmationBatch) -> Result<(), WalletError> {
        let new_notes = encode_all(&batch.new_notes, |r| r.id())?;
        let tx_hash = batch.tx_hash;
        let res = (&self.notes, &self.entries).transaction(|(notes, entries)| {
            for id in &batch.spent_notes {
                let mut note: ShieldedNoteRecord = load(notes, SHIELDED_TABLE, id)?;
                if !note.status.can_become(NoteStatus::Used) {
                    return abort(WalletError::InvalidTransition {
                        table: SHIELDED_TABLE,
                        id: id.clone(),
                        from: note.status.as_str(),
                        to: NoteStatus::Used.as_str(),
                    });
                }
                note.status = NoteStatus::Used;
                note.used_in = Some(tx_hash);
                notes.insert(id.as_bytes(), encode_in_tx(&note)?)?;
            }
            if let Some(id) = &batch.consumed_entry {
                let mut entry: WormholeEntryRecord = load(entries, WORMHOLE_TABLE, id)?;
                if !entry.status.can_become(EntryStatus::Completed) {
                    return abort(WalletError::InvalidTransition {
                        table: WORMHOLE_TABLE,
                        id: id.clone(),
                        from: entry.status.as_str(),
                        to: EntryStatus::Completed.as_str(),
                    });
                }
                entry.status = EntryStatus::Completed;
                entry.used_in = Some(tx_hash);
                entries.insert(id.as_bytes(), encode_in_tx(&entry)?)?;
            }
            for (id, bytes) in &new_notes {
                ensure_absent(notes, SHIELDED_TABLE, id)?;
                notes.insert(id.as_bytes(), bytes.clone())?;
            }
            Ok(())
        });
        finish(res)?;
        debug!(
            tx = %tx_hash,
            spent = batch.spent_notes.len(),
            created = batch.new_notes.len(),
            "applied confirmation"
        );
        Ok(())
    }
}

fn encode_all<T: BorshSerialize>(
    records: &[T],
    id: impl Fn(&T) -> String,
) -> Result<Vec<(String, Vec<u8>)>, WalletError> {
    records
        .iter()
        .map(|r| Ok((id(r), borsh::to_vec(r)?)))
        .collect()
}

fn encode_in_tx<T: BorshSerialize>(
    record: &T,
) -> ConflictableTransactionResult<Vec<u8>, WalletError> {
    borsh::to_vec(record).map_err(|e| ConflictableTransactionError::Abort(WalletError::Codec(e)))
}

fn abort<T>(err: WalletError) -> ConflictableTransactionResult<T, WalletError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn ensure_absent(
    tx: &TransactionalTree,
    table: &'static str,
    id: &str,
) -> ConflictableTransactionResult<(), WalletError> {
    if tx.get(id.as_bytes())?.is_some() {
        return abort(WalletError::DoubleRecord {
            table,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn load<T: BorshDeserialize>(
    tx: &TransactionalTree,
    table: &'static str,
    id: &str,
) -> ConflictableTransactionResult<T, WalletError> {
    match tx.get(id.as_bytes())? {
        Some(bytes) => T::try_from_slice(&bytes)
            .map_err(|e| ConflictableTransactionError::Abort(WalletError::Codec(e))),
        None => abort(WalletError::MissingRecord {
            table,
            id: id.to_string(),
        }),
    }
}

fn finish<T>(res: Result<T, TransactionError<WalletError>>) -> Result<T, WalletError> {
    res.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => WalletError::Store(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn owner() -> Address {
        Address([0x0a; 20])
    }

    fn note(leaf_index: u64, amount: u128) -> ShieldedNoteRecord {
        let mut rec = ShieldedNoteRecord {
            chain_id: 1,
            tree_id: 0,
            leaf_index,
            owner: owner(),
            token: Address([0xee; 20]),
            token_id: 0,
            blinding: Fr::from_u64(leaf_index + 1000),
            amount: Amount::from_units(amount),
            commitment: Fr::zero(),
            status: NoteStatus::Available,
            created_in: Hash32::zero(),
            used_in: None,
        };
        rec.commitment = rec.expected_commitment();
        rec
    }

    fn entry(entry_id: u64, status: EntryStatus) -> WormholeEntryRecord {
        WormholeEntryRecord {
            entry_id,
            chain_id: 1,
            recipient: owner(),
            sender: Address([0x0b; 20]),
            burn_address: Address([0x0c; 20]),
            secret: Fr::from_u64(42069),
            token: Address([0xee; 20]),
            token_id: 0,
            amount: Amount::from_units(70),
            status,
            position: Some(EntryPosition {
                tree_id: 0,
                leaf_index: entry_id,
            }),
            used_in: None,
        }
    }

    fn open() -> (NoteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = NoteStore::open(&dir.path().join("wallet.db"), owner()).unwrap();
        (store, dir)
    }

    #[test]
    fn insert_twice_is_double_record() {
        let (store, _dir) = open();
        store.insert_note(&note(0, 10)).unwrap();
        let err = store.insert_note(&note(0, 10)).unwrap_err();
        assert!(matches!(err, WalletError::DoubleRecord { table: "shielded_note", .. }));
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let (store, _dir) = open();
        store.insert_note(&note(1, 10)).unwrap();
        let err = store.insert_notes(&[note(0, 5), note(1, 10)]).unwrap_err();
        assert!(matches!(err, WalletError::DoubleRecord { .. }));
        assert!(store.get_note("1:0:0").unwrap().is_none());
    }

    #[test]
    fn update_of_missing_record_fails() {
        let (store, _dir) = open();
        let err = store.update_note(&note(3, 10)).unwrap_err();
        assert!(matches!(err, WalletError::MissingRecord { .. }));
    }

    #[test]
    fn used_note_cannot_be_resurrected() {
        let (store, _dir) = open();
        let mut rec = note(0, 10);
        store.insert_note(&rec).unwrap();
        rec.status = NoteStatus::Used;
        store.update_note(&rec).unwrap();
        rec.status = NoteStatus::Available;
        let err = store.update_note(&rec).unwrap_err();
        assert!(matches!(
            err,
            WalletError::InvalidTransition { from: "used", to: "available", .. }
        ));
    }

    #[test]
    fn update_cannot_rewrite_the_opening() {
        let (store, _dir) = open();
        let rec = note(0, 10);
        store.insert_note(&rec).unwrap();
        let mut forged = rec.clone();
        forged.amount = Amount::from_units(1_000_000);
        let err = store.update_note(&forged).unwrap_err();
        assert!(matches!(err, WalletError::ImmutableField { table: "shielded_note", .. }));
        assert_eq!(store.get_note(&rec.id()).unwrap(), Some(rec));

        let pending = entry(2, EntryStatus::Pending);
        store.insert_entry(&pending).unwrap();
        let mut forged = pending.clone();
        forged.recipient = Address([0x66; 20]);
        forged.status = EntryStatus::Approved;
        let err = store.update_entry(&forged).unwrap_err();
        assert!(matches!(err, WalletError::ImmutableField { table: "wormhole_note", .. }));
        assert_eq!(store.get_entry(2).unwrap(), Some(pending));
    }

    #[test]
    fn update_may_move_status_spend_and_position() {
        let (store, _dir) = open();
        let mut rec = entry(5, EntryStatus::Pending);
        rec.position = None;
        store.insert_entry(&rec).unwrap();
        rec.status = EntryStatus::Approved;
        rec.position = Some(EntryPosition {
            tree_id: 1,
            leaf_index: 9,
        });
        store.update_entry(&rec).unwrap();
        rec.status = EntryStatus::Completed;
        rec.used_in = Some(Hash32([7; 32]));
        store.update_entry(&rec).unwrap();
        assert_eq!(store.get_entry(5).unwrap(), Some(rec));
    }

    #[test]
    fn entry_transitions_are_one_way() {
        let (store, _dir) = open();
        store.insert_entry(&entry(4, EntryStatus::Pending)).unwrap();
        store
            .set_entry_status(4, EntryStatus::Approved, None)
            .unwrap();
        assert!(store.set_entry_status(4, EntryStatus::Pending, None).is_err());
        assert!(store.set_entry_status(4, EntryStatus::Rejected, None).is_err());
        store
            .set_entry_status(4, EntryStatus::Completed, None)
            .unwrap();
        assert!(store
            .set_entry_status(4, EntryStatus::Ragequitted, None)
            .is_err());
    }

    #[test]
    fn balance_counts_available_notes_and_spendable_entries_once() {
        let (store, _dir) = open();
        store.insert_notes(&[note(0, 10), note(1, 15)]).unwrap();
        store
            .insert_entries(&[entry(0, EntryStatus::Approved), entry(1, EntryStatus::Pending)])
            .unwrap();
        let bal = store.balance(1, Address([0xee; 20]), 0).unwrap();
        assert_eq!(bal.shielded, Amount::from_units(25));
        assert_eq!(bal.bridged, Amount::from_units(70));
        assert_eq!(bal.total().unwrap(), Amount::from_units(95));
    }

    #[test]
    fn confirmation_is_atomic() {
        let (store, _dir) = open();
        store.insert_notes(&[note(0, 10), note(1, 15)]).unwrap();
        store.insert_entry(&entry(0, EntryStatus::Approved)).unwrap();

        // Second new note collides with an existing id, so nothing applies.
        let bad = ConfirmationBatch {
            tx_hash: Hash32([1; 32]),
            spent_notes: vec!["1:0:0".into()],
            consumed_entry: Some("0".into()),
            new_notes: vec![note(2, 3), note(1, 1)],
        };
        assert!(store.apply_confirmation(&bad).is_err());
        assert_eq!(
            store.get_note("1:0:0").unwrap().unwrap().status,
            NoteStatus::Available
        );
        assert_eq!(
            store.get_entry(0).unwrap().unwrap().status,
            EntryStatus::Approved
        );

        let good = ConfirmationBatch {
            new_notes: vec![note(2, 3)],
            ..bad
        };
        store.apply_confirmation(&good).unwrap();
        let spent = store.get_note("1:0:0").unwrap().unwrap();
        assert_eq!(spent.status, NoteStatus::Used);
        assert_eq!(spent.used_in, Some(Hash32([1; 32])));
        assert_eq!(
            store.get_entry(0).unwrap().unwrap().status,
            EntryStatus::Completed
        );
        assert!(store.get_note("1:0:2").unwrap().is_some());

        // Confirming the same spend again is a transition error.
        let again = ConfirmationBatch {
            tx_hash: Hash32([2; 32]),
            spent_notes: vec!["1:0:0".into()],
            consumed_entry: None,
            new_notes: vec![],
        };
        assert!(matches!(
            store.apply_confirmation(&again),
            Err(WalletError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn stores_are_scoped_per_account() {
        let dir = tempdir().unwrap();
        let db = sled::open(dir.path().join("shared.db")).unwrap();
        let a = NoteStore::with_db(&db, owner()).unwrap();
        let b = NoteStore::with_db(&db, Address([0x0d; 20])).unwrap();
        a.insert_note(&note(0, 10)).unwrap();
        assert!(b.notes().unwrap().is_empty());
        assert!(b.insert_note(&note(0, 10)).is_ok());
    }
}
