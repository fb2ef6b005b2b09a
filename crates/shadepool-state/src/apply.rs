//! Event projection: fold the pool contract's event log into trees, spent
//! sets and entry records.
//!
//! Every event is validated in full before anything is mutated, so a rejected
//! event leaves the projector exactly as it was.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use shadepool_core::{Address, Amount, Fr, Withdrawal, MAX_TREE_LEAVES};

use crate::entities::{
    EntryPlacement, EntryRecord, EntryState, PoolRecord, ProjectorStats, TreeSnapshot,
    WithdrawalRecord,
};
use crate::error::StateError;
use crate::events::{ChainEvent, EventMeta, LoggedEvent, TreeKind};
use crate::merkle::AppendOnlyMerkleTree;
use crate::nullifier::NullifierSet;

#[derive(Clone, Debug, Default)]
struct TrackedTree {
    tree: AppendOnlyMerkleTree,
    created_at: u64,
    updated_at: u64,
}

/// Replayable reducer over the pool's event log.
#[derive(Clone, Debug, Default)]
pub struct EventProjector {
    shielded: BTreeMap<u64, TrackedTree>,
    wormhole: BTreeMap<u64, TrackedTree>,
    spent: NullifierSet,
    wormhole_spent: NullifierSet,
    entries: BTreeMap<u64, EntryRecord>,
    withdrawals: Vec<WithdrawalRecord>,
    total_unshielded: HashMap<(Address, u128), Amount>,
    pools: BTreeMap<Address, PoolRecord>,
    implementations: HashMap<Address, bool>,
    verifiers: HashMap<(u8, u8), Address>,
    approvers: HashSet<Address>,
    owner: Option<Address>,
    domain_changes: u64,
    events: u64,
    last: Option<(u64, u64)>,
}

impl EventProjector {
    /// Create an empty projector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a projector by applying `events` in order.
    pub fn replay<'a, I>(events: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = &'a LoggedEvent>,
    {
        let mut projector = Self::new();
        for ev in events {
            projector.apply(ev)?;
        }
        Ok(projector)
    }

    /// Apply one event. On error nothing changes.
    pub fn apply(&mut self, logged: &LoggedEvent) -> Result<(), StateError> {
        self.check_order(&logged.meta)?;
        let meta = &logged.meta;

        match &logged.event {
            ChainEvent::PoolCreated {
                pool,
                implementation,
                asset,
                init_data,
            } => {
                self.pools.insert(
                    *asset,
                    PoolRecord {
                        pool: *pool,
                        implementation: *implementation,
                        asset: *asset,
                        init_data: init_data.clone(),
                        start_block: meta.block_number,
                        created_at: meta.block_timestamp,
                    },
                );
            }
            ChainEvent::PoolImplementationSet {
                implementation,
                is_approved,
            } => {
                self.implementations.insert(*implementation, *is_approved);
            }
            ChainEvent::VerifierAdded {
                verifier,
                inputs,
                outputs,
            } => {
                self.verifiers.insert((*inputs, *outputs), *verifier);
            }
            ChainEvent::WormholeApproverSet {
                approver,
                is_approver,
            } => {
                if *is_approver {
                    self.approvers.insert(*approver);
                } else {
                    self.approvers.remove(approver);
                }
            }
            ChainEvent::WormholeEntry {
                entry_id,
                token,
                from,
                to,
                token_id,
                amount,
            } => {
                if self.entries.contains_key(entry_id) {
                    return Err(StateError::DuplicateEntry(*entry_id));
                }
                self.entries.insert(
                    *entry_id,
                    EntryRecord {
                        entry_id: *entry_id,
                        token: *token,
                        from: *from,
                        to: *to,
                        token_id: *token_id,
                        amount: *amount,
                        state: EntryState::Pending,
                        placement: None,
                        created_at: meta.block_timestamp,
                        tx_hash: meta.tx_hash,
                    },
                );
            }
            ChainEvent::WormholeCommitment {
                entry_id,
                commitment,
                tree_id,
                leaf_index,
                asset_id,
                approved,
                ..
            } => {
                let entry = self
                    .entries
                    .get(entry_id)
                    .ok_or(StateError::UnknownEntry(*entry_id))?;
                let next = if *approved {
                    EntryState::Approved
                } else {
                    EntryState::Rejected
                };
                if entry.state != EntryState::Pending {
                    return Err(StateError::InvalidEntryTransition {
                        entry_id: *entry_id,
                        from: entry.state.as_str(),
                        to: next.as_str(),
                    });
                }
                check_append(TreeKind::Wormhole, &self.wormhole, *tree_id, *leaf_index, 1)?;

                append(&mut self.wormhole, *tree_id, &[*commitment], meta)?;
                if let Some(entry) = self.entries.get_mut(entry_id) {
                    entry.state = next;
                    entry.placement = Some(EntryPlacement {
                        commitment: *commitment,
                        tree_id: *tree_id,
                        leaf_index: *leaf_index,
                        asset_id: *asset_id,
                    });
                }
            }
            ChainEvent::ShieldedTransfer {
                tree_id,
                start_index,
                commitments,
                nullifiers,
                withdrawals,
            } => {
                if let Some(nullifier) = self.spent.first_conflict(nullifiers) {
                    warn!(%nullifier, tree_id, "shielded nullifier replayed");
                    return Err(StateError::DoubleSpend { nullifier });
                }
                check_append(
                    TreeKind::Shielded,
                    &self.shielded,
                    *tree_id,
                    *start_index,
                    commitments.len() as u64,
                )?;
                let unshielded = self.unshielded_after(withdrawals)?;

                append(&mut self.shielded, *tree_id, commitments, meta)?;
                for nf in nullifiers {
                    self.spent.insert(*nf);
                }
                for (position, withdrawal) in withdrawals.iter().enumerate() {
                    self.withdrawals.push(WithdrawalRecord {
                        tree_id: *tree_id,
                        position: position as u32,
                        withdrawal: *withdrawal,
                        meta: *meta,
                    });
                }
                self.total_unshielded.extend(unshielded);
            }
            ChainEvent::WormholeNullifier { nullifier } => {
                if self.wormhole_spent.contains(nullifier) {
                    warn!(%nullifier, "wormhole nullifier replayed");
                    return Err(StateError::DoubleSpend {
                        nullifier: *nullifier,
                    });
                }
                self.wormhole_spent.insert(*nullifier);
            }
            ChainEvent::Ragequit { entry_id, .. } => {
                let entry = self
                    .entries
                    .get_mut(entry_id)
                    .ok_or(StateError::UnknownEntry(*entry_id))?;
                if entry.state == EntryState::Ragequitted {
                    return Err(StateError::InvalidEntryTransition {
                        entry_id: *entry_id,
                        from: entry.state.as_str(),
                        to: EntryState::Ragequitted.as_str(),
                    });
                }
                entry.state = EntryState::Ragequitted;
            }
            ChainEvent::Eip712DomainChanged => {
                self.domain_changes += 1;
            }
            ChainEvent::OwnershipTransferred { new_owner, .. } => {
                self.owner = Some(*new_owner);
            }
        }

        self.last = Some(meta.position());
        self.events += 1;
        debug!(
            event = logged.event.name(),
            block = meta.block_number,
            log_index = meta.log_index,
            "applied event"
        );
        Ok(())
    }

    fn check_order(&self, meta: &EventMeta) -> Result<(), StateError> {
        match self.last {
            Some(last) if meta.position() <= last => Err(StateError::OutOfOrder {
                block: meta.block_number,
                log_index: meta.log_index,
                last_block: last.0,
                last_log_index: last.1,
            }),
            _ => Ok(()),
        }
    }

    /// New `(token, token_id)` totals after `withdrawals`, computed without
    /// mutating. Zero-amount payouts are not counted.
    fn unshielded_after(
        &self,
        withdrawals: &[Withdrawal],
    ) -> Result<HashMap<(Address, u128), Amount>, StateError> {
        let mut updated: HashMap<(Address, u128), Amount> = HashMap::new();
        for w in withdrawals.iter().filter(|w| !w.amount.is_zero()) {
            let key = (w.asset, w.token_id);
            let current = updated
                .get(&key)
                .or_else(|| self.total_unshielded.get(&key))
                .copied()
                .unwrap_or_default();
            let next = current
                .checked_add(w.amount)
                .map_err(|_| StateError::AmountOverflow)?;
            updated.insert(key, next);
        }
        Ok(updated)
    }

    /// Snapshot of a tree, if the id has ever been appended to.
    pub fn tree(&self, kind: TreeKind, tree_id: u64) -> Option<TreeSnapshot> {
        let trees = match kind {
            TreeKind::Shielded => &self.shielded,
            TreeKind::Wormhole => &self.wormhole,
        };
        trees.get(&tree_id).map(|t| TreeSnapshot {
            tree_id,
            leaves: t.tree.leaves().to_vec(),
            root: t.tree.root(),
            size: t.tree.len(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        })
    }

    /// Snapshot of a shielded tree.
    pub fn shielded_tree(&self, tree_id: u64) -> Option<TreeSnapshot> {
        self.tree(TreeKind::Shielded, tree_id)
    }

    /// Snapshot of a wormhole tree.
    pub fn wormhole_tree(&self, tree_id: u64) -> Option<TreeSnapshot> {
        self.tree(TreeKind::Wormhole, tree_id)
    }

    /// Root of a tree; zero for ids never appended to.
    pub fn root(&self, kind: TreeKind, tree_id: u64) -> Fr {
        let trees = match kind {
            TreeKind::Shielded => &self.shielded,
            TreeKind::Wormhole => &self.wormhole,
        };
        trees
            .get(&tree_id)
            .map(|t| t.tree.root())
            .unwrap_or_else(Fr::zero)
    }

    /// One entry by id.
    pub fn entry(&self, entry_id: u64) -> Option<&EntryRecord> {
        self.entries.get(&entry_id)
    }

    /// Entries for the given ids; unknown ids are skipped.
    pub fn entries(&self, ids: &[u64]) -> Vec<EntryRecord> {
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Entries deposited by, or sent to, `address`, in id order.
    pub fn entries_by_address(&self, address: &Address) -> Vec<EntryRecord> {
        self.entries
            .values()
            .filter(|e| e.from == *address || e.to == *address)
            .cloned()
            .collect()
    }

    /// Whether a shielded nullifier has been published.
    pub fn is_spent(&self, nullifier: &Fr) -> bool {
        self.spent.contains(nullifier)
    }

    /// Whether a bridge nullifier has been published.
    pub fn is_wormhole_spent(&self, nullifier: &Fr) -> bool {
        self.wormhole_spent.contains(nullifier)
    }

    /// Shielded spent set.
    pub fn spent_nullifiers(&self) -> &NullifierSet {
        &self.spent
    }

    /// Bridge spent set.
    pub fn wormhole_nullifiers(&self) -> &NullifierSet {
        &self.wormhole_spent
    }

    /// Sum of nonzero payouts of one token id of `asset` so far.
    pub fn total_unshielded(&self, asset: &Address, token_id: u128) -> Amount {
        self.total_unshielded
            .get(&(*asset, token_id))
            .copied()
            .unwrap_or_default()
    }

    /// Every payout in settlement order.
    pub fn withdrawals(&self) -> &[WithdrawalRecord] {
        &self.withdrawals
    }

    /// Pool for an underlying asset.
    pub fn pool(&self, asset: &Address) -> Option<&PoolRecord> {
        self.pools.get(asset)
    }

    /// Whether an implementation is currently approved.
    pub fn is_implementation_approved(&self, implementation: &Address) -> bool {
        self.implementations
            .get(implementation)
            .copied()
            .unwrap_or(false)
    }

    /// Verifier registered for an arity.
    pub fn verifier(&self, inputs: u8, outputs: u8) -> Option<Address> {
        self.verifiers.get(&(inputs, outputs)).copied()
    }

    /// Whether `address` may screen entries.
    pub fn is_approver(&self, address: &Address) -> bool {
        self.approvers.contains(address)
    }

    /// Current contract owner, if ownership was ever transferred.
    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    /// Number of signing-domain changes observed.
    pub fn domain_changes(&self) -> u64 {
        self.domain_changes
    }

    /// `(block_number, log_index)` of the last applied event.
    pub fn last_position(&self) -> Option<(u64, u64)> {
        self.last
    }

    /// Aggregate counters.
    pub fn stats(&self) -> ProjectorStats {
        ProjectorStats {
            events: self.events,
            shielded_trees: self.shielded.len() as u64,
            wormhole_trees: self.wormhole.len() as u64,
            entries: self.entries.len() as u64,
            spent: self.spent.len() as u64,
            wormhole_spent: self.wormhole_spent.len() as u64,
            last_block: self.last.map(|(block, _)| block),
        }
    }
}

fn check_append(
    kind: TreeKind,
    trees: &BTreeMap<u64, TrackedTree>,
    tree_id: u64,
    claimed: u64,
    count: u64,
) -> Result<(), StateError> {
    let len = trees.get(&tree_id).map_or(0, |t| t.tree.len());
    if claimed != len {
        return Err(StateError::LeafIndexMismatch {
            kind,
            tree_id,
            claimed,
            len,
        });
    }
    if len.saturating_add(count) > MAX_TREE_LEAVES {
        return Err(StateError::TreeFull);
    }
    Ok(())
}

fn append(
    trees: &mut BTreeMap<u64, TrackedTree>,
    tree_id: u64,
    leaves: &[Fr],
    meta: &EventMeta,
) -> Result<(), StateError> {
    let tracked = trees.entry(tree_id).or_insert_with(|| TrackedTree {
        tree: AppendOnlyMerkleTree::new(),
        created_at: meta.block_timestamp,
        updated_at: meta.block_timestamp,
    });
    for leaf in leaves {
        tracked.tree.insert(*leaf)?;
    }
    tracked.updated_at = meta.block_timestamp;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadepool_core::Hash32;

    fn at(block: u64, log_index: u64, event: ChainEvent) -> LoggedEvent {
        LoggedEvent {
            meta: EventMeta {
                block_number: block,
                block_timestamp: 1_000 + block,
                tx_hash: Hash32::zero(),
                log_index,
            },
            event,
        }
    }

    fn transfer(start_index: u64, commitments: &[u64], nullifiers: &[u64]) -> ChainEvent {
        ChainEvent::ShieldedTransfer {
            tree_id: 0,
            start_index,
            commitments: commitments.iter().map(|c| Fr::from_u64(*c)).collect(),
            nullifiers: nullifiers.iter().map(|n| Fr::from_u64(*n)).collect(),
            withdrawals: vec![],
        }
    }

    #[test]
    fn transfer_appends_and_spends() {
        let mut p = EventProjector::new();
        p.apply(&at(1, 0, transfer(0, &[10, 11], &[100]))).unwrap();
        let tree = p.shielded_tree(0).unwrap();
        assert_eq!(tree.size, 2);
        assert_eq!(tree.created_at, 1_001);
        assert!(p.is_spent(&Fr::from_u64(100)));
    }

    #[test]
    fn double_spend_is_rejected_without_mutation() {
        let mut p = EventProjector::new();
        p.apply(&at(1, 0, transfer(0, &[10, 11], &[100]))).unwrap();
        let before = p.shielded_tree(0).unwrap();
        let err = p.apply(&at(2, 0, transfer(2, &[12, 13], &[101, 100])));
        assert!(matches!(err, Err(StateError::DoubleSpend { nullifier }) if nullifier == Fr::from_u64(100)));
        assert_eq!(p.shielded_tree(0).unwrap(), before);
        assert!(!p.is_spent(&Fr::from_u64(101)));
        assert_eq!(p.last_position(), Some((1, 0)));
    }

    #[test]
    fn start_index_must_match_tree_size() {
        let mut p = EventProjector::new();
        let err = p.apply(&at(1, 0, transfer(3, &[10], &[])));
        assert!(matches!(
            err,
            Err(StateError::LeafIndexMismatch { claimed: 3, len: 0, .. })
        ));
    }

    #[test]
    fn events_must_be_strictly_ordered() {
        let mut p = EventProjector::new();
        p.apply(&at(5, 3, ChainEvent::Eip712DomainChanged)).unwrap();
        assert!(matches!(
            p.apply(&at(5, 3, ChainEvent::Eip712DomainChanged)),
            Err(StateError::OutOfOrder { .. })
        ));
        assert!(p.apply(&at(5, 4, ChainEvent::Eip712DomainChanged)).is_ok());
    }

    #[test]
    fn entry_lifecycle() {
        let token = Address([1; 20]);
        let mut p = EventProjector::new();
        p.apply(&at(
            1,
            0,
            ChainEvent::WormholeEntry {
                entry_id: 0,
                token,
                from: Address([2; 20]),
                to: Address([3; 20]),
                token_id: 0,
                amount: Amount::from_units(50),
            },
        ))
        .unwrap();
        assert_eq!(p.entry(0).unwrap().state, EntryState::Pending);

        p.apply(&at(
            2,
            0,
            ChainEvent::WormholeCommitment {
                entry_id: 0,
                commitment: Fr::from_u64(77),
                tree_id: 0,
                leaf_index: 0,
                asset_id: Fr::one(),
                from: Address([2; 20]),
                to: Address([3; 20]),
                amount: Amount::from_units(50),
                approved: true,
            },
        ))
        .unwrap();
        let entry = p.entry(0).unwrap();
        assert_eq!(entry.state, EntryState::Approved);
        assert_eq!(entry.placement.unwrap().leaf_index, 0);
        assert_eq!(p.wormhole_tree(0).unwrap().root, Fr::from_u64(77));
        assert_eq!(p.entries_by_address(&Address([3; 20])).len(), 1);

        p.apply(&at(
            3,
            0,
            ChainEvent::Ragequit {
                entry_id: 0,
                quitter: Address([2; 20]),
                returned_to: Address([2; 20]),
                asset: token,
                token_id: 0,
                amount: Amount::from_units(50),
            },
        ))
        .unwrap();
        assert_eq!(p.entry(0).unwrap().state, EntryState::Ragequitted);
    }

    #[test]
    fn commitment_for_unknown_entry_fails() {
        let mut p = EventProjector::new();
        let err = p.apply(&at(
            1,
            0,
            ChainEvent::WormholeCommitment {
                entry_id: 9,
                commitment: Fr::from_u64(1),
                tree_id: 0,
                leaf_index: 0,
                asset_id: Fr::one(),
                from: Address::zero(),
                to: Address::zero(),
                amount: Amount::zero(),
                approved: true,
            },
        ));
        assert!(matches!(err, Err(StateError::UnknownEntry(9))));
        assert!(p.wormhole_tree(0).is_none());
    }

    #[test]
    fn unshielded_totals_skip_zero_amounts_and_split_token_ids() {
        let asset = Address([9; 20]);
        let mut p = EventProjector::new();
        p.apply(&at(
            1,
            0,
            ChainEvent::ShieldedTransfer {
                tree_id: 0,
                start_index: 0,
                commitments: vec![Fr::from_u64(1), Fr::from_u64(2)],
                nullifiers: vec![Fr::from_u64(3)],
                withdrawals: vec![
                    Withdrawal {
                        to: Address([4; 20]),
                        asset,
                        token_id: 0,
                        amount: Amount::from_units(30),
                    },
                    Withdrawal {
                        to: Address([4; 20]),
                        asset,
                        token_id: 0,
                        amount: Amount::zero(),
                    },
                    Withdrawal {
                        to: Address([4; 20]),
                        asset,
                        token_id: 7,
                        amount: Amount::from_units(5),
                    },
                ],
            },
        ))
        .unwrap();
        assert_eq!(p.total_unshielded(&asset, 0), Amount::from_units(30));
        assert_eq!(p.total_unshielded(&asset, 7), Amount::from_units(5));
        assert_eq!(p.total_unshielded(&asset, 8), Amount::zero());
        assert_eq!(p.withdrawals().len(), 3);
    }

    #[test]
    fn registries_follow_events() {
        let mut p = EventProjector::new();
        let approver = Address([5; 20]);
        p.apply(&at(
            1,
            0,
            ChainEvent::WormholeApproverSet {
                approver,
                is_approver: true,
            },
        ))
        .unwrap();
        p.apply(&at(
            1,
            1,
            ChainEvent::VerifierAdded {
                verifier: Address([6; 20]),
                inputs: 2,
                outputs: 2,
            },
        ))
        .unwrap();
        assert!(p.is_approver(&approver));
        assert_eq!(p.verifier(2, 2), Some(Address([6; 20])));

        p.apply(&at(
            2,
            0,
            ChainEvent::WormholeApproverSet {
                approver,
                is_approver: false,
            },
        ))
        .unwrap();
        assert!(!p.is_approver(&approver));
    }
}
