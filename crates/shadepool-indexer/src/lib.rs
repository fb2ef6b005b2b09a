#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Reference indexer: persists the pool's event log, keeps an
//! [`shadepool_state::EventProjector`] over it and serves tree snapshots and
//! entry records to wallets over line-delimited JSON.

pub mod event_store;
pub mod ingest;
pub mod rpc;

pub use event_store::{EventStore, StoreError};
pub use ingest::{ingest, read_event_file, rebuild, IngestReport};
pub use rpc::{handle_request, serve_rpc};
