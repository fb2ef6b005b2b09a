//! Greedy input selection.
//!
//! A transfer spends at most two shielded notes and at most one bridge entry.
//! Preference order, each tried largest-first:
//!
//! 1. a single bridge entry,
//! 2. one note, then two notes from the same tree,
//! 3. an entry plus one note, then an entry plus two notes.
//!
//! Not optimal, but it never needs more than one tree per kind.

use tracing::debug;

use shadepool_core::{Address, Amount};

use crate::error::WalletError;
use crate::store::{NoteStatus, ShieldedNoteRecord, WormholeEntryRecord};

/// What the caller wants to move.
#[derive(Clone, Copy, Debug)]
pub struct SelectionRequest {
    /// Chain the records must belong to.
    pub chain_id: u64,
    /// Owner of the notes and recipient of the entry.
    pub account: Address,
    /// Token contract.
    pub token: Address,
    /// Token id within the contract.
    pub token_id: u128,
    /// Amount to cover.
    pub amount: Amount,
}

/// Chosen inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Shielded notes, at most two.
    pub notes: Vec<ShieldedNoteRecord>,
    /// Bridge entry, when one is used.
    pub entry: Option<WormholeEntryRecord>,
}

impl Selection {
    /// Value of every selected input.
    pub fn total(&self) -> Result<Amount, WalletError> {
        let notes = Amount::checked_sum(self.notes.iter().map(|n| n.amount))?;
        let entry = self.entry.as_ref().map(|e| e.amount).unwrap_or_default();
        Ok(notes.checked_add(entry)?)
    }

    /// Shielded tree the notes live in. All selected notes share it.
    pub fn shielded_tree_id(&self) -> Option<u64> {
        self.notes.first().map(|n| n.tree_id)
    }

    /// Wormhole tree the entry lives in.
    pub fn wormhole_tree_id(&self) -> Option<u64> {
        self.entry
            .as_ref()
            .and_then(|e| e.position)
            .map(|p| p.tree_id)
    }
}

/// Pick inputs covering `req.amount`, or fail with [`WalletError::InsufficientFunds`].
pub fn select_inputs(
    req: &SelectionRequest,
    notes: &[ShieldedNoteRecord],
    entries: &[WormholeEntryRecord],
) -> Result<Selection, WalletError> {
    if req.amount.is_zero() {
        return Err(WalletError::InvalidRequest(
            "transfer amount must be nonzero".into(),
        ));
    }

    let mut notes: Vec<&ShieldedNoteRecord> = notes
        .iter()
        .filter(|n| {
            n.status == NoteStatus::Available
                && !n.amount.is_zero()
                && n.chain_id == req.chain_id
                && n.owner == req.account
                && n.token == req.token
                && n.token_id == req.token_id
        })
        .collect();
    notes.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then(a.tree_id.cmp(&b.tree_id))
            .then(a.leaf_index.cmp(&b.leaf_index))
    });

    let mut entries: Vec<&WormholeEntryRecord> = entries
        .iter()
        .filter(|e| {
            e.is_spendable()
                && e.chain_id == req.chain_id
                && e.recipient == req.account
                && e.token == req.token
                && e.token_id == req.token_id
        })
        .collect();
    entries.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.entry_id.cmp(&b.entry_id)));

    debug!(
        notes = notes.len(),
        entries = entries.len(),
        requested = %req.amount,
        "selecting inputs"
    );

    let covers = |parts: &[Amount]| -> Result<bool, WalletError> {
        Ok(Amount::checked_sum(parts.iter().copied())? >= req.amount)
    };

    // 1. a single entry
    for entry in &entries {
        if covers(&[entry.amount])? {
            return Ok(picked(&[], Some(*entry)));
        }
    }

    // 2. notes only
    for note in &notes {
        if covers(&[note.amount])? {
            return Ok(picked(&[*note], None));
        }
    }
    if let Some((a, b)) = same_tree_pair(&notes, &[], &covers)? {
        return Ok(picked(&[a, b], None));
    }

    // 3. entry plus notes
    for entry in &entries {
        for note in &notes {
            if covers(&[entry.amount, note.amount])? {
                return Ok(picked(&[*note], Some(*entry)));
            }
        }
    }
    for entry in &entries {
        if let Some((a, b)) = same_tree_pair(&notes, &[entry.amount], &covers)? {
            return Ok(picked(&[a, b], Some(*entry)));
        }
    }

    let available = Amount::checked_sum(
        notes
            .iter()
            .map(|n| n.amount)
            .chain(entries.iter().map(|e| e.amount)),
    )?;
    Err(WalletError::InsufficientFunds {
        requested: req.amount,
        available,
    })
}

fn same_tree_pair<'a>(
    notes: &[&'a ShieldedNoteRecord],
    extra: &[Amount],
    covers: &impl Fn(&[Amount]) -> Result<bool, WalletError>,
) -> Result<Option<(&'a ShieldedNoteRecord, &'a ShieldedNoteRecord)>, WalletError> {
    for (i, a) in notes.iter().enumerate() {
        for b in &notes[i + 1..] {
            if a.tree_id != b.tree_id {
                continue;
            }
            let mut parts = extra.to_vec();
            parts.push(a.amount);
            parts.push(b.amount);
            if covers(&parts)? {
                return Ok(Some((*a, *b)));
            }
        }
    }
    Ok(None)
}

fn picked(notes: &[&ShieldedNoteRecord], entry: Option<&WormholeEntryRecord>) -> Selection {
    Selection {
        notes: notes.iter().map(|n| (*n).clone()).collect(),
        entry: entry.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EntryPosition, EntryStatus};
    use shadepool_core::{Fr, Hash32};

    const ME: Address = Address([0x0a; 20]);
    const TOKEN: Address = Address([0xee; 20]);

    fn note(tree_id: u64, leaf_index: u64, amount: u128) -> ShieldedNoteRecord {
        ShieldedNoteRecord {
            chain_id: 1,
            tree_id,
            leaf_index,
            owner: ME,
            token: TOKEN,
            token_id: 0,
            blinding: Fr::from_u64(leaf_index + 7),
            amount: Amount::from_units(amount),
            commitment: Fr::zero(),
            status: NoteStatus::Available,
            created_in: Hash32::zero(),
            used_in: None,
        }
    }

    fn entry(entry_id: u64, amount: u128) -> WormholeEntryRecord {
        WormholeEntryRecord {
            entry_id,
            chain_id: 1,
            recipient: ME,
            sender: Address([0x0b; 20]),
            burn_address: Address([0x0c; 20]),
            secret: Fr::from_u64(99),
            token: TOKEN,
            token_id: 0,
            amount: Amount::from_units(amount),
            status: EntryStatus::Approved,
            position: Some(EntryPosition {
                tree_id: 0,
                leaf_index: entry_id,
            }),
            used_in: None,
        }
    }

    fn request(amount: u128) -> SelectionRequest {
        SelectionRequest {
            chain_id: 1,
            account: ME,
            token: TOKEN,
            token_id: 0,
            amount: Amount::from_units(amount),
        }
    }

    #[test]
    fn single_entry_preferred() {
        let sel = select_inputs(&request(50), &[note(0, 0, 80)], &[entry(3, 60)]).unwrap();
        assert!(sel.notes.is_empty());
        assert_eq!(sel.entry.unwrap().entry_id, 3);
    }

    #[test]
    fn largest_note_first() {
        let sel = select_inputs(&request(20), &[note(0, 0, 30), note(0, 1, 90)], &[]).unwrap();
        assert_eq!(sel.notes.len(), 1);
        assert_eq!(sel.notes[0].leaf_index, 1);
    }

    #[test]
    fn pair_must_share_a_tree() {
        let notes = [note(0, 0, 100), note(1, 0, 100)];
        let err = select_inputs(&request(150), &notes, &[]).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));

        let notes = [note(0, 0, 100), note(1, 0, 100), note(1, 1, 60)];
        let sel = select_inputs(&request(150), &notes, &[]).unwrap();
        assert!(sel.notes.iter().all(|n| n.tree_id == 1));
        assert_eq!(sel.total().unwrap(), Amount::from_units(160));
    }

    #[test]
    fn entry_combined_with_notes() {
        let sel = select_inputs(&request(100), &[note(0, 0, 45)], &[entry(0, 60)]).unwrap();
        assert_eq!(sel.notes.len(), 1);
        assert!(sel.entry.is_some());

        let notes = [note(0, 0, 30), note(0, 1, 30)];
        let sel = select_inputs(&request(100), &notes, &[entry(0, 50)]).unwrap();
        assert_eq!(sel.notes.len(), 2);
        assert_eq!(sel.wormhole_tree_id(), Some(0));
    }

    #[test]
    fn ignores_used_foreign_and_unapproved() {
        let mut used = note(0, 0, 500);
        used.status = NoteStatus::Used;
        let mut foreign = note(0, 1, 500);
        foreign.owner = Address([0x0f; 20]);
        let mut pending = entry(0, 500);
        pending.status = EntryStatus::Pending;
        let mut consumed = entry(1, 500);
        consumed.used_in = Some(Hash32([1; 32]));

        let err = select_inputs(&request(10), &[used, foreign, note(0, 2, 4)], &[pending, consumed])
            .unwrap_err();
        match err {
            WalletError::InsufficientFunds {
                requested,
                available,
            } => {
                assert_eq!(requested, Amount::from_units(10));
                assert_eq!(available, Amount::from_units(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_amount_rejected() {
        assert!(matches!(
            select_inputs(&request(0), &[note(0, 0, 1)], &[]),
            Err(WalletError::InvalidRequest(_))
        ));
    }
}
