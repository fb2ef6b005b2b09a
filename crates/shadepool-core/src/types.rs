//! Canonical protocol types.
//!
//! These are the values that feed commitments, nullifiers and the circuit
//! inputs. Field-visible encodings must stay stable once notes exist on chain.

use core::fmt;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{ADDRESS_LEN, FIELD_BYTES};
use crate::field::Fr;

/// Errors related to parsing, validation, or construction of core protocol types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Hex string had an unexpected byte length.
    #[error("invalid hex length: expected {expected} bytes, got {got} bytes")]
    InvalidHexLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        got: usize,
    },

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Arithmetic overflow or underflow occurred.
    #[error("amount overflow or underflow")]
    AmountOverflow,

    /// Encoded integer is not below the field modulus.
    #[error("value is not a canonical field element")]
    NotInField,

    /// A value violated protocol constraints.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}

/// Fixed-size 32-byte hash: transaction hashes and signed digests.
///
/// Unlike [`Fr`] this is not reduced; keccak output may exceed the modulus.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Hash32(pub [u8; FIELD_BYTES]);

impl Hash32 {
    /// Returns an all-zero hash.
    pub const fn zero() -> Self {
        Self([0u8; FIELD_BYTES])
    }

    /// Returns the underlying byte array.
    pub const fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; FIELD_BYTES]> for Hash32 {
    fn from(value: [u8; FIELD_BYTES]) -> Self {
        Self(value)
    }
}

impl FromStr for Hash32 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != FIELD_BYTES {
            return Err(CoreError::InvalidHexLength {
                expected: FIELD_BYTES,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; FIELD_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

#[cfg(feature = "serde")]
impl Serialize for Hash32 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 20-byte public-ledger address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The zero address.
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_LEN])
    }

    /// Returns the underlying byte array.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Left-zero-padded field embedding.
    pub fn to_field(self) -> Fr {
        let mut bytes = [0u8; FIELD_BYTES];
        bytes[FIELD_BYTES - ADDRESS_LEN..].copy_from_slice(&self.0);
        // 160-bit values are always canonical.
        Fr::from_be_bytes_reduce(&bytes)
    }

    /// Low 160 bits of a field element.
    pub fn from_field_low(fr: Fr) -> Self {
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&fr.as_bytes()[FIELD_BYTES - ADDRESS_LEN..]);
        Self(out)
    }
}

impl From<Address> for Fr {
    fn from(a: Address) -> Self {
        a.to_field()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != ADDRESS_LEN {
            return Err(CoreError::InvalidHexLength {
                expected: ADDRESS_LEN,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

#[cfg(feature = "serde")]
impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Token amount in the smallest unit. 128 bits covers 18-decimal supplies.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct Amount(pub u128);

impl Amount {
    /// Returns a zero amount.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Constructs an amount from base units.
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Returns the underlying value.
    pub const fn units(self) -> u128 {
        self.0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Result<Self, CoreError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Result<Self, CoreError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Checked sum over an iterator.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Result<Self, CoreError> {
        iter.into_iter()
            .try_fold(Amount::zero(), |acc, a| acc.checked_add(a))
    }

    /// Field embedding.
    pub fn to_field(self) -> Fr {
        Fr::from_u128(self.0)
    }
}

impl From<Amount> for Fr {
    fn from(a: Amount) -> Self {
        a.to_field()
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|_| CoreError::InvalidValue("amount must be a decimal integer"))
    }
}

// Decimal strings: JSON numbers lose precision above 2^53.
#[cfg(feature = "serde")]
impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How an output note leaves the transaction.
///
/// The discriminant is the value hashed into commitments.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum TransferKind {
    /// Stays in the shielded pool as a new note.
    Transfer = 1,
    /// Leaves the pool to a public recipient.
    Withdrawal = 2,
}

impl TransferKind {
    /// Field encoding.
    pub fn to_field(self) -> Fr {
        Fr::from_u64(self as u64)
    }
}

/// Recipient of an output note.
///
/// Most outputs go to an address; change notes and some withdrawals carry an
/// already-derived field value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Recipient {
    /// Public-ledger address.
    Address(Address),
    /// Raw field value.
    Raw(Fr),
}

impl Recipient {
    /// Field embedding.
    pub fn to_field(self) -> Fr {
        match self {
            Recipient::Address(a) => a.to_field(),
            Recipient::Raw(fr) => fr,
        }
    }
}

impl From<Address> for Recipient {
    fn from(a: Address) -> Self {
        Recipient::Address(a)
    }
}

/// An output note opening.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputNote {
    /// Who may later spend (or receive) the value.
    pub recipient: Recipient,
    /// Hiding randomness. Zero marks a public output.
    pub blinding: Fr,
    /// Value carried.
    pub amount: Amount,
    /// Transfer or withdrawal.
    pub kind: TransferKind,
}

/// A shielded note as seen by the spender.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InputNote {
    /// Hiding randomness the note was created with.
    pub blinding: Fr,
    /// Value carried.
    pub amount: Amount,
    /// Position in its shielded tree.
    pub leaf_index: u64,
}

/// A bridge deposit opening.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WormholeNote {
    /// Shielded owner the deposit is destined for.
    pub recipient: Address,
    /// Public account that funded the burn address.
    pub sender: Address,
    /// Secret binding the burn address to the recipient.
    pub secret: Fr,
    /// Asset id of the deposited token.
    pub asset_id: Fr,
    /// Deposited value.
    pub amount: Amount,
}

/// A public payout recorded by a shielded transfer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Withdrawal {
    /// Public recipient.
    pub to: Address,
    /// Token contract.
    pub asset: Address,
    /// Token id (zero for fungible tokens).
    #[cfg_attr(feature = "serde", serde(with = "crate::serialization::decimal_u128"))]
    pub token_id: u128,
    /// Amount paid out.
    pub amount: Amount,
}
