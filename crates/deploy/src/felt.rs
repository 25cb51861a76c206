//! Starknet field element.

use std::{fmt, str::FromStr};

use alloy_core::primitives::U256;
use derive_more::Deref;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// The Starknet prime: `2^251 + 17 * 2^192 + 1`.
pub const FELT_PRIME: U256 = U256::from_limbs([1, 0, 0, 0x0800_0000_0000_0011]);

/// Mask keeping the low 251 bits. Any value under it is a valid felt.
const MASK_251: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, 0x07ff_ffff_ffff_ffff]);

/// Maximum length of a Cairo short string.
pub const SHORT_STRING_MAX_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeltError {
    #[error("invalid felt '{input}': {reason}")]
    Invalid { input: String, reason: String },
    #[error("felt '{0}' is not below the field prime")]
    OutOfRange(String),
    #[error("short string '{0}' must be ASCII and at most 31 bytes")]
    InvalidShortString(String),
}

/// A field element, always strictly below [`FELT_PRIME`].
///
/// The text form is `0x`-prefixed lowercase hex, which is also the serde form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deref)]
pub struct Felt(U256);

impl Felt {
    pub const ZERO: Felt = Felt(U256::ZERO);
    pub const ONE: Felt = Felt(U256::from_limbs([1, 0, 0, 0]));

    /// Build a felt from an integer that may exceed the field.
    pub fn new(value: U256) -> Result<Self, FeltError> {
        if value >= FELT_PRIME {
            return Err(FeltError::OutOfRange(format!("{value:#x}")));
        }
        Ok(Self(value))
    }

    /// Little-endian 64-bit limbs. The caller guarantees the value is below
    /// the prime.
    pub(crate) const fn from_raw_limbs(limbs: [u64; 4]) -> Self {
        Self(U256::from_limbs(limbs))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Interpret 32 big-endian bytes as an integer and keep the low 251 bits.
    pub fn from_be_bytes_truncated(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes) & MASK_251)
    }

    /// Big-endian encoding of up to 31 bytes. Never exceeds the field.
    pub(crate) fn from_be_slice_31(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= SHORT_STRING_MAX_LEN);
        Self(U256::from_be_slice(bytes))
    }

    /// Encode a Cairo short string (ASCII, at most 31 bytes).
    pub fn from_short_string(value: &str) -> Result<Self, FeltError> {
        if !value.is_ascii() || value.len() > SHORT_STRING_MAX_LEN {
            return Err(FeltError::InvalidShortString(value.to_string()));
        }
        Ok(Self::from_be_slice_31(value.as_bytes()))
    }

    /// A uniformly random felt below `2^251`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 32] = rng.random();
        Self::from_be_bytes_truncated(bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

impl FromStr for Felt {
    type Err = FeltError;

    /// Parses `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| FeltError::Invalid {
            input: s.to_string(),
            reason,
        };

        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some("") => return Err(invalid("empty hex digits".to_string())),
            Some(hex) => U256::from_str_radix(hex, 16),
            None if s.is_empty() => return Err(invalid("empty string".to_string())),
            None => U256::from_str_radix(s, 10),
        }
        .map_err(|e| invalid(e.to_string()))?;

        Self::new(value)
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        if value { Self::ONE } else { Self::ZERO }
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({self})")
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
