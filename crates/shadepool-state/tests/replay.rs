use shadepool_core::{Address, Amount, Fr, Hash32, Withdrawal};
use shadepool_state::{ChainEvent, EventMeta, EventProjector, LoggedEvent, StateError, TreeKind};

fn meta(block: u64, log_index: u64) -> EventMeta {
    EventMeta {
        block_number: block,
        block_timestamp: 1_700_000_000 + block * 12,
        tx_hash: Hash32([block as u8; 32]),
        log_index,
    }
}

fn sample_log() -> Vec<LoggedEvent> {
    let token = Address([0xaa; 20]);
    let depositor = Address([0x01; 20]);
    let burn = Address([0x02; 20]);
    vec![
        LoggedEvent {
            meta: meta(1, 0),
            event: ChainEvent::WormholeApproverSet {
                approver: Address([0x0f; 20]),
                is_approver: true,
            },
        },
        LoggedEvent {
            meta: meta(2, 0),
            event: ChainEvent::WormholeEntry {
                entry_id: 0,
                token,
                from: depositor,
                to: burn,
                token_id: 0,
                amount: Amount::from_units(100),
            },
        },
        LoggedEvent {
            meta: meta(3, 0),
            event: ChainEvent::WormholeCommitment {
                entry_id: 0,
                commitment: Fr::from_u64(0xc0ffee),
                tree_id: 0,
                leaf_index: 0,
                asset_id: Fr::from_u64(1),
                from: depositor,
                to: burn,
                amount: Amount::from_units(100),
                approved: true,
            },
        },
        LoggedEvent {
            meta: meta(4, 0),
            event: ChainEvent::WormholeNullifier {
                nullifier: Fr::from_u64(0xbeef),
            },
        },
        LoggedEvent {
            meta: meta(4, 1),
            event: ChainEvent::ShieldedTransfer {
                tree_id: 0,
                start_index: 0,
                commitments: vec![Fr::from_u64(11), Fr::from_u64(12)],
                nullifiers: vec![Fr::from_u64(21), Fr::from_u64(22)],
                withdrawals: vec![],
            },
        },
        LoggedEvent {
            meta: meta(5, 0),
            event: ChainEvent::ShieldedTransfer {
                tree_id: 0,
                start_index: 2,
                commitments: vec![Fr::from_u64(13), Address([0x44; 20]).to_field()],
                nullifiers: vec![Fr::from_u64(23), Fr::from_u64(24)],
                withdrawals: vec![Withdrawal {
                    to: Address([0x44; 20]),
                    asset: token,
                    token_id: 0,
                    amount: Amount::from_units(40),
                }],
            },
        },
    ]
}

#[test]
fn replay_is_idempotent() {
    let log = sample_log();
    let a = EventProjector::replay(&log).unwrap();
    let b = EventProjector::replay(&log).unwrap();

    for kind in [TreeKind::Shielded, TreeKind::Wormhole] {
        assert_eq!(a.root(kind, 0), b.root(kind, 0));
    }
    assert_eq!(a.spent_nullifiers().sorted(), b.spent_nullifiers().sorted());
    assert_eq!(a.wormhole_nullifiers().sorted(), b.wormhole_nullifiers().sorted());
    assert_eq!(a.stats(), b.stats());
}

#[test]
fn replaying_into_the_same_projector_is_rejected() {
    let log = sample_log();
    let mut p = EventProjector::replay(&log).unwrap();
    let root = p.root(TreeKind::Shielded, 0);
    assert!(matches!(p.apply(&log[4]), Err(StateError::OutOfOrder { .. })));
    assert_eq!(p.root(TreeKind::Shielded, 0), root);
}

#[test]
fn relocated_nullifier_is_flagged_not_dropped() {
    let mut log = sample_log();
    log.push(LoggedEvent {
        meta: meta(6, 0),
        event: ChainEvent::ShieldedTransfer {
            tree_id: 0,
            start_index: 4,
            commitments: vec![Fr::from_u64(15)],
            nullifiers: vec![Fr::from_u64(22)],
            withdrawals: vec![],
        },
    });
    let err = EventProjector::replay(&log).unwrap_err();
    assert!(matches!(err, StateError::DoubleSpend { nullifier } if nullifier == Fr::from_u64(22)));
}

#[test]
fn json_lines_log_replays_identically() {
    let log = sample_log();
    let lines: Vec<String> = log
        .iter()
        .map(|ev| serde_json::to_string(ev).unwrap())
        .collect();
    let decoded: Vec<LoggedEvent> = lines
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(decoded, log);
    // Token ids travel as decimal strings inside the tagged event.
    assert!(lines[1].contains(r#""token_id":"0""#));
    let a = EventProjector::replay(&log).unwrap();
    let b = EventProjector::replay(&decoded).unwrap();
    assert_eq!(a.shielded_tree(0), b.shielded_tree(0));
    assert_eq!(a.entry(0), b.entry(0));
    assert_eq!(a.total_unshielded(&Address([0xaa; 20]), 0), Amount::from_units(40));
}
