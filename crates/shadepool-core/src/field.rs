//! Canonical BN254 scalar-field elements.
//!
//! Every value that crosses into a hash, a tree or the circuit is an [`Fr`].
//! The representation is the 32-byte big-endian integer, always strictly below
//! the modulus; reduction happens once, at construction.

use core::fmt;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};

use crate::constants::{BN254_MODULUS_BE, FIELD_BYTES};
use crate::types::CoreError;

/// Element of the BN254 scalar field.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize)]
pub struct Fr([u8; FIELD_BYTES]);

impl Fr {
    /// The additive identity.
    pub const fn zero() -> Self {
        Self([0u8; FIELD_BYTES])
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self::from_u64(1)
    }

    /// Embed a small integer.
    pub fn from_u64(v: u64) -> Self {
        Self::from_u128(u128::from(v))
    }

    /// Embed a 128-bit integer. Always below the modulus.
    pub fn from_u128(v: u128) -> Self {
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - 16..].copy_from_slice(&v.to_be_bytes());
        Self(out)
    }

    /// Interpret arbitrary big-endian bytes as an integer and reduce it mod p.
    pub fn from_be_bytes_reduce(bytes: &[u8]) -> Self {
        let n = BigUint::from_bytes_be(bytes) % modulus();
        Self::from_biguint_reduced(&n)
    }

    /// Strict constructor: rejects encodings at or above the modulus.
    pub fn from_be_bytes(bytes: [u8; FIELD_BYTES]) -> Result<Self, CoreError> {
        if !fits_in_field(&bytes) {
            return Err(CoreError::NotInField);
        }
        Ok(Self(bytes))
    }

    /// Draw 32 uniformly random bytes and reduce them into the field.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; FIELD_BYTES];
        rng.fill_bytes(&mut bytes);
        Self::from_be_bytes_reduce(&bytes)
    }

    /// Canonical 32-byte big-endian encoding.
    pub const fn to_bytes(self) -> [u8; FIELD_BYTES] {
        self.0
    }

    /// Borrow the canonical encoding.
    pub const fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Whether this is the zero element.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The value as an arbitrary-precision integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// The value as `u128`, if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..FIELD_BYTES - 16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[FIELD_BYTES - 16..]);
        Some(u128::from_be_bytes(low))
    }

    fn from_biguint_reduced(n: &BigUint) -> Self {
        let raw = n.to_bytes_be();
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - raw.len()..].copy_from_slice(&raw);
        Self(out)
    }
}

/// Returns `true` if the big-endian integer is strictly below the modulus.
///
/// Used to reject message digests that the circuit could not represent.
pub fn fits_in_field(bytes: &[u8; FIELD_BYTES]) -> bool {
    // Big-endian byte arrays order the same way as the integers they encode.
    bytes < &BN254_MODULUS_BE
}

fn modulus() -> BigUint {
    BigUint::from_bytes_be(&BN254_MODULUS_BE)
}

impl BorshDeserialize for Fr {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let bytes = <[u8; FIELD_BYTES]>::deserialize_reader(reader)?;
        Fr::from_be_bytes(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl From<u64> for Fr {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl From<u128> for Fr {
    fn from(v: u128) -> Self {
        Self::from_u128(v)
    }
}

impl From<bool> for Fr {
    fn from(v: bool) -> Self {
        Self::from_u64(u64::from(v))
    }
}

impl fmt::Debug for Fr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fr(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Fr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Fr {
    type Err = CoreError;

    /// Parses `0x`-prefixed (or bare) hex of at most 32 bytes; odd lengths are
    /// left-padded. Values at or above the modulus are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let padded;
        let s = if s.len() % 2 == 1 {
            padded = format!("0{s}");
            padded.as_str()
        } else {
            s
        };
        let bytes = hex::decode(s)?;
        if bytes.len() > FIELD_BYTES {
            return Err(CoreError::InvalidHexLength {
                expected: FIELD_BYTES,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; FIELD_BYTES];
        arr[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
        Self::from_be_bytes(arr)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Fr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Fr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn modulus_reduces_to_zero() {
        assert_eq!(Fr::from_be_bytes_reduce(&BN254_MODULUS_BE), Fr::zero());
        assert!(Fr::from_be_bytes(BN254_MODULUS_BE).is_err());
    }

    #[test]
    fn modulus_plus_one_reduces_to_one() {
        let mut bytes = BN254_MODULUS_BE;
        bytes[31] += 1;
        assert_eq!(Fr::from_be_bytes_reduce(&bytes), Fr::one());
    }

    #[test]
    fn all_ones_is_reduced() {
        let fr = Fr::from_be_bytes_reduce(&[0xff; 32]);
        assert!(fits_in_field(fr.as_bytes()));
    }

    #[test]
    fn hex_round_trip() {
        let fr = Fr::from_u128(0xdead_beef);
        let parsed: Fr = fr.to_string().parse().unwrap();
        assert_eq!(parsed, fr);
        let short: Fr = "0xabc".parse().unwrap();
        assert_eq!(short, Fr::from_u64(0xabc));
    }

    #[test]
    fn u128_extraction() {
        assert_eq!(Fr::from_u128(u128::MAX).to_u128(), Some(u128::MAX));
        let big = Fr::from_be_bytes_reduce(&[0x01; 32]);
        assert_eq!(big.to_u128(), None);
    }

    #[test]
    fn borsh_rejects_non_canonical() {
        let bytes = borsh::to_vec(&BN254_MODULUS_BE).unwrap();
        assert!(Fr::try_from_slice(&bytes).is_err());
        let ok = borsh::to_vec(&Fr::from_u64(7)).unwrap();
        assert_eq!(Fr::try_from_slice(&ok).unwrap(), Fr::from_u64(7));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_hex_strings() {
        let json = serde_json::to_string(&Fr::from_u64(255)).unwrap();
        assert_eq!(
            json,
            "\"0x00000000000000000000000000000000000000000000000000000000000000ff\""
        );
    }

    proptest! {
        #[test]
        fn reduction_matches_biguint(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let expected = BigUint::from_bytes_be(&bytes) % modulus();
            let fr = Fr::from_be_bytes_reduce(&bytes);
            prop_assert_eq!(fr.to_biguint(), expected);
            prop_assert!(fits_in_field(fr.as_bytes()));
        }

        #[test]
        fn strict_parse_agrees_with_bound(bytes in any::<[u8; 32]>()) {
            let strict = Fr::from_be_bytes(bytes);
            prop_assert_eq!(strict.is_ok(), BigUint::from_bytes_be(&bytes) < modulus());
            if let Ok(fr) = strict {
                prop_assert_eq!(fr, Fr::from_be_bytes_reduce(&bytes));
            }
        }
    }
}
