//! Canonical serialization helpers.
//!
//! Borsh is the storage encoding for every persisted record. Keccak-256 is
//! the digest the pool contract recomputes, so it is the only byte hash used
//! for anything signed.

use sha3::{Digest, Keccak256};

use crate::types::CoreError;

/// Encode a value with canonical Borsh encoding.
pub fn to_bytes<T: borsh::BorshSerialize>(v: &T) -> Result<Vec<u8>, CoreError> {
    borsh::to_vec(v).map_err(|_| CoreError::InvalidValue("borsh serialization failed"))
}

/// Decode a Borsh-encoded value, rejecting trailing bytes.
pub fn from_bytes<T: borsh::BorshDeserialize>(bytes: &[u8]) -> Result<T, CoreError> {
    T::try_from_slice(bytes).map_err(|_| CoreError::InvalidValue("borsh deserialization failed"))
}

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `u128` as a decimal JSON string.
///
/// serde_json cannot read a `u128` number back through an internally tagged
/// enum, and JSON consumers lose precision above 2^53 anyway.
#[cfg(feature = "serde")]
pub mod decimal_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Write the value as a decimal string.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Read a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.trim().parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak_concatenates_parts() {
        assert_eq!(keccak256(&[b"ab", b"c"]), keccak256(&[b"abc"]));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn token_ids_survive_a_tagged_enum() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        #[serde(tag = "type")]
        enum Tagged {
            Payout {
                #[serde(with = "decimal_u128")]
                token_id: u128,
            },
        }
        let ev = Tagged::Payout { token_id: u128::MAX };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(&format!("\"{}\"", u128::MAX)));
        assert_eq!(serde_json::from_str::<Tagged>(&json).unwrap(), ev);
    }

    #[test]
    fn borsh_round_trip() {
        let bytes = to_bytes(&(7u64, String::from("note"))).unwrap();
        let back: (u64, String) = from_bytes(&bytes).unwrap();
        assert_eq!(back, (7, "note".to_string()));
    }
}
