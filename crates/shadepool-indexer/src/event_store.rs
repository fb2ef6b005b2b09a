use std::path::Path;

use borsh::BorshDeserialize;
use sled::transaction::{TransactionError, TransactionResult, Transactional};
use thiserror::Error;

use shadepool_state::LoggedEvent;

const TREE_EVENTS: &str = "events";
const TREE_META: &str = "meta";
const KEY_LAST: &[u8] = b"last";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage: {0}")]
    Sled(#[from] sled::Error),
    #[error("codec: {0}")]
    Codec(#[from] std::io::Error),
    #[error("event ({block}, {log_index}) does not follow stored position ({last_block}, {last_log_index})")]
    OutOfOrder {
        block: u64,
        log_index: u64,
        last_block: u64,
        last_log_index: u64,
    },
}

/// Big-endian `(block, log_index)` so sled's byte order is chain order.
fn event_key(block: u64, log_index: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&block.to_be_bytes());
    key[8..].copy_from_slice(&log_index.to_be_bytes());
    key
}

fn decode_position(bytes: &[u8]) -> Option<(u64, u64)> {
    if bytes.len() != 16 {
        return None;
    }
    let mut block = [0u8; 8];
    let mut log_index = [0u8; 8];
    block.copy_from_slice(&bytes[..8]);
    log_index.copy_from_slice(&bytes[8..]);
    Some((u64::from_be_bytes(block), u64::from_be_bytes(log_index)))
}

/// Append-only log of pool events.
pub struct EventStore {
    events: sled::Tree,
    meta: sled::Tree,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let events = db.open_tree(TREE_EVENTS)?;
        let meta = db.open_tree(TREE_META)?;
        Ok(Self { events, meta })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_position(&self) -> Result<Option<(u64, u64)>, StoreError> {
        Ok(self
            .meta
            .get(KEY_LAST)?
            .and_then(|bytes| decode_position(&bytes)))
    }

    /// Append a batch in one transaction. Every event must sort strictly
    /// after the previous one and after what is already stored.
    pub fn append(&self, batch: &[LoggedEvent]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut last = self.last_position()?;
        let mut encoded = Vec::with_capacity(batch.len());
        for ev in batch {
            let position = ev.meta.position();
            if let Some(prev) = last {
                if position <= prev {
                    return Err(StoreError::OutOfOrder {
                        block: position.0,
                        log_index: position.1,
                        last_block: prev.0,
                        last_log_index: prev.1,
                    });
                }
            }
            last = Some(position);
            encoded.push((event_key(position.0, position.1), borsh::to_vec(ev)?));
        }
        let tail = encoded.last().map(|(key, _)| *key);

        let res: TransactionResult<(), sled::Error> =
            (&self.events, &self.meta).transaction(|(events, meta)| {
                for (key, bytes) in &encoded {
                    events.insert(&key[..], bytes.clone())?;
                }
                if let Some(key) = &tail {
                    meta.insert(KEY_LAST, &key[..])?;
                }
                Ok(())
            });
        res.map_err(|e| match e {
            TransactionError::Abort(e) | TransactionError::Storage(e) => StoreError::Sled(e),
        })
    }

    /// Every stored event in chain order.
    pub fn load_all(&self) -> Result<Vec<LoggedEvent>, StoreError> {
        let mut out = Vec::with_capacity(self.events.len());
        for item in self.events.iter() {
            let (_, v) = item?;
            out.push(LoggedEvent::try_from_slice(&v)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadepool_core::{Fr, Hash32};
    use shadepool_state::{ChainEvent, EventMeta};
    use tempfile::tempdir;

    fn logged(block: u64, log_index: u64, nf: u64) -> LoggedEvent {
        LoggedEvent {
            meta: EventMeta {
                block_number: block,
                block_timestamp: block * 12,
                tx_hash: Hash32([block as u8; 32]),
                log_index,
            },
            event: ChainEvent::WormholeNullifier {
                nullifier: Fr::from_u64(nf),
            },
        }
    }

    #[test]
    fn keys_sort_in_chain_order() {
        assert!(event_key(1, 300) < event_key(2, 0));
        assert!(event_key(256, 0) > event_key(255, 9));
        assert_eq!(decode_position(&event_key(7, 3)), Some((7, 3)));
    }

    #[test]
    fn restart_preserves_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events");
        {
            let store = EventStore::open(&path).unwrap();
            store
                .append(&[logged(1, 0, 1), logged(1, 1, 2), logged(300, 0, 3)])
                .unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        let events = store.load_all().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].meta.block_number, 300);
        assert_eq!(store.last_position().unwrap(), Some((300, 0)));
    }

    #[test]
    fn rejects_out_of_order_batch_without_writing() {
        let dir = tempdir().unwrap();
        let store = EventStore::open(&dir.path().join("events")).unwrap();
        store.append(&[logged(5, 0, 1)]).unwrap();

        let err = store.append(&[logged(6, 0, 2), logged(4, 0, 3)]).unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { block: 4, .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.last_position().unwrap(), Some((5, 0)));
    }
}
