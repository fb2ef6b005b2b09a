use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use shadepool_state::{EventProjector, LoggedEvent};

use crate::event_store::EventStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Parse a JSON-lines event file. Blank lines and `#` comments are ignored.
pub fn read_event_file(path: &Path) -> Result<Vec<LoggedEvent>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let ev: LoggedEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{}: bad event", path.display(), n + 1))?;
        out.push(ev);
    }
    Ok(out)
}

/// Rebuild the projector from everything the store holds.
pub fn rebuild(store: &EventStore) -> Result<EventProjector> {
    let events = store.load_all()?;
    let projector = EventProjector::replay(&events).context("replaying stored events")?;
    info!(events = events.len(), "projector rebuilt");
    Ok(projector)
}

/// Apply events past the projector's position, then persist them.
///
/// Events already seen are skipped, so re-reading a growing file is safe. The
/// batch is validated in full on a copy; a bad event leaves both the store
/// and the projector untouched.
pub fn ingest(
    store: &EventStore,
    projector: &mut EventProjector,
    events: &[LoggedEvent],
) -> Result<IngestReport> {
    let last = projector.last_position();
    let fresh: Vec<LoggedEvent> = events
        .iter()
        .filter(|ev| last.map_or(true, |l| ev.meta.position() > l))
        .cloned()
        .collect();
    let skipped = events.len() - fresh.len();
    if fresh.is_empty() {
        debug!(skipped, "nothing new to ingest");
        return Ok(IngestReport {
            applied: 0,
            skipped,
        });
    }

    let mut staged = projector.clone();
    for ev in &fresh {
        staged.apply(ev).with_context(|| {
            format!(
                "{} at ({}, {})",
                ev.event.name(),
                ev.meta.block_number,
                ev.meta.log_index
            )
        })?;
    }
    store.append(&fresh)?;
    *projector = staged;
    info!(applied = fresh.len(), skipped, "ingested events");
    Ok(IngestReport {
        applied: fresh.len(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use shadepool_core::{Address, Amount, Fr, Hash32};
    use shadepool_state::{ChainEvent, EventMeta, TreeKind};
    use tempfile::{tempdir, NamedTempFile};

    fn transfer(block: u64, start_index: u64, leaf: u64, nf: u64) -> LoggedEvent {
        LoggedEvent {
            meta: EventMeta {
                block_number: block,
                block_timestamp: 1_700_000_000 + block,
                tx_hash: Hash32([block as u8; 32]),
                log_index: 0,
            },
            event: ChainEvent::ShieldedTransfer {
                tree_id: 0,
                start_index,
                commitments: vec![Fr::from_u64(leaf)],
                nullifiers: vec![Fr::from_u64(nf)],
                withdrawals: vec![],
            },
        }
    }

    #[test]
    fn reads_json_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# pool events").unwrap();
        writeln!(file, "{}", serde_json::to_string(&transfer(1, 0, 10, 1)).unwrap()).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", serde_json::to_string(&transfer(2, 1, 11, 2)).unwrap()).unwrap();
        let deposit = LoggedEvent {
            meta: EventMeta {
                block_number: 3,
                block_timestamp: 1_700_000_003,
                tx_hash: Hash32([3; 32]),
                log_index: 0,
            },
            event: ChainEvent::WormholeEntry {
                entry_id: 0,
                token: Address([0xee; 20]),
                from: Address([0xd0; 20]),
                to: Address([0xb0; 20]),
                token_id: u128::MAX,
                amount: Amount::from_units(5),
            },
        };
        writeln!(file, "{}", serde_json::to_string(&deposit).unwrap()).unwrap();
        let events = read_event_file(file.path()).unwrap();
        assert_eq!(
            events,
            vec![transfer(1, 0, 10, 1), transfer(2, 1, 11, 2), deposit]
        );
    }

    #[test]
    fn reingest_skips_seen_events_and_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events");
        let log = vec![transfer(1, 0, 10, 1), transfer(2, 1, 11, 2)];
        {
            let store = EventStore::open(&path).unwrap();
            let mut projector = rebuild(&store).unwrap();
            let first = ingest(&store, &mut projector, &log[..1]).unwrap();
            assert_eq!(first.applied, 1);
            let second = ingest(&store, &mut projector, &log).unwrap();
            assert_eq!(second, IngestReport { applied: 1, skipped: 1 });
        }
        let store = EventStore::open(&path).unwrap();
        let projector = rebuild(&store).unwrap();
        let tree = projector.tree(TreeKind::Shielded, 0).unwrap();
        assert_eq!(tree.leaves, vec![Fr::from_u64(10), Fr::from_u64(11)]);
    }

    #[test]
    fn bad_event_leaves_everything_untouched() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(&dir.path().join("events")).unwrap();
        let mut projector = EventProjector::new();
        ingest(&store, &mut projector, &[transfer(1, 0, 10, 1)]).unwrap();

        // Second event replays nullifier 1.
        let batch = [transfer(2, 1, 11, 5), transfer(3, 2, 12, 1)];
        assert!(ingest(&store, &mut projector, &batch).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(projector.tree(TreeKind::Shielded, 0).unwrap().size, 1);
    }
}
