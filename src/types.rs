//! Core value types shared by the raffle, the oracle and the API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Native value in the smallest unit (wei)
pub type Amount = u128;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Current wall-clock time as a unix timestamp
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Error returned when parsing a hex-encoded identifier fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHexError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

fn decode_prefixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let body = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    let bytes = hex::decode(body).map_err(|e| ParseHexError::InvalidHex(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| ParseHexError::WrongLength {
        expected: N,
        actual: b.len(),
    })
}

macro_rules! hex_identifier {
    ($name:ident, $len:expr) => {
        impl $name {
            pub const LEN: usize = $len;

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_prefixed::<$len>(s.trim()).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Account-like identifier of a participant, the raffle itself or the oracle
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

hex_identifier!(Address, 20);

impl Address {
    /// Deterministic address derived from a label, handy for fixtures and simulations
    pub fn derive(label: &str) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }
}

/// Gas lane / key identifier selecting the oracle proving key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyHash([u8; 32]);

hex_identifier!(KeyHash, 32);

/// One random word delivered by the oracle, a 256-bit big-endian unsigned integer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RandomWord([u8; 32]);

hex_identifier!(RandomWord, 32);

impl RandomWord {
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// `self mod len`, exact over the full 256 bits. Returns `None` when `len` is zero.
    pub fn index_for(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let modulus = len as u128;
        // remainder < modulus <= 2^64, so the shift never overflows
        let rem = self
            .0
            .iter()
            .fold(0u128, |acc, &byte| ((acc << 8) | byte as u128) % modulus);
        Some(rem as usize)
    }
}

/// Correlation id between a randomness request and its fulfillment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serde helpers for amounts carried as decimal strings (JSON and TOML cannot hold u128 natively)
pub mod amount_serde {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a decimal amount, accepting `_` digit separators
pub fn parse_amount(s: &str) -> Option<Amount> {
    s.trim().replace('_', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_and_case() {
        let addr: Address = "0x9DdfaCa8183c41ad55329BdeeD9F6A8d53168B1B".parse().unwrap();
        assert_eq!(addr.to_string(), "0x9ddfaca8183c41ad55329bdeed9f6a8d53168b1b");
        assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert_eq!("1234".parse::<Address>(), Err(ParseHexError::MissingPrefix));
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(ParseHexError::WrongLength { expected: 20, actual: 2 })
        );
        assert!(matches!("0xzz".parse::<Address>(), Err(ParseHexError::InvalidHex(_))));
    }

    #[test]
    fn test_index_for_small_values() {
        assert_eq!(RandomWord::from_u64(6).index_for(4), Some(2));
        assert_eq!(RandomWord::from_u64(3).index_for(1), Some(0));
        assert_eq!(RandomWord::from_u64(3).index_for(0), None);
    }

    #[test]
    fn test_index_for_full_width() {
        // 2^256 - 1 mod 10 = 5 (2^256 ends in ...936)
        let max = RandomWord::from_bytes([0xff; 32]);
        assert_eq!(max.index_for(10), Some(5));
        // 2^255 mod 3: 2^odd mod 3 = 2
        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        assert_eq!(RandomWord::from_bytes(bytes).index_for(3), Some(2));
    }

    #[test]
    fn test_amount_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "amount_serde")]
            value: Amount,
        }
        let json = serde_json::to_string(&Wrapper { value: u128::MAX }).unwrap();
        assert_eq!(json, format!("{{\"value\":\"{}\"}}", u128::MAX));
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, u128::MAX);
    }

    #[test]
    fn test_derived_addresses_are_distinct() {
        assert_ne!(Address::derive("alice"), Address::derive("bob"));
        assert_eq!(Address::derive("alice"), Address::derive("alice"));
    }
}
