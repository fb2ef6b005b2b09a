#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shadepool core: field elements, Poseidon2 hashing, note derivations and
//! the canonical types they operate on.

pub mod constants;
pub mod crypto;
pub mod field;
pub mod hash;
pub mod serialization;
pub mod types;

pub use constants::*;
pub use crypto::*;
pub use field::*;
pub use hash::*;
pub use serialization::*;
pub use types::*;
