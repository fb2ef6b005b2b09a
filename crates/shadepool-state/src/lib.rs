#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shadepool state.
//!
//! Responsibilities:
//! - Maintain the append-only shielded and wormhole trees
//! - Maintain the shielded and bridge spent sets
//! - Project the pool contract's event log into the records wallets query
//!
//! Proofs are not verified here; the contract has already done so by the time
//! an event exists.

pub mod apply;
pub mod entities;
pub mod error;
pub mod events;
pub mod merkle;
pub mod nullifier;

pub use apply::*;
pub use entities::*;
pub use error::*;
pub use events::*;
pub use merkle::*;
pub use nullifier::*;
