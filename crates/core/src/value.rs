//! Value and token amounts
//!
//! Token amounts fit comfortably in `u128` (the curve caps supply at 10^24).
//! Payment-asset values do not: the curve's scale constant alone is 10^45,
//! so every value computation runs on a 256-bit integer.

use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for payment-asset values.
    pub struct U256(4);
}

/// Market token amount in base units (18 decimals)
pub type TokenAmount = u128;

/// Number of decimals of a whole token
pub const DECIMALS: u32 = 18;

/// One whole token in base units
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Errors produced when parsing human-readable amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Amount string is empty")]
    Empty,

    #[error("Invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("Too many decimals in {value}: at most {max}")]
    TooManyDecimals { value: String, max: u32 },

    #[error("Amount overflows token range: {0}")]
    Overflow(String),
}

/// Parse a decimal token string (e.g. `"83333.333"`) into base units.
///
/// # Example
/// ```
/// use curvebank_core::{parse_units, WAD};
///
/// assert_eq!(parse_units("1").unwrap(), WAD);
/// assert_eq!(parse_units("0.5").unwrap(), WAD / 2);
/// ```
pub fn parse_units(input: &str) -> Result<TokenAmount, UnitsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    if fraction.len() > DECIMALS as usize {
        return Err(UnitsError::TooManyDecimals {
            value: input.to_string(),
            max: DECIMALS,
        });
    }

    let digits_ok = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits_ok(whole) || !digits_ok(fraction) || (whole.is_empty() && fraction.is_empty()) {
        return Err(UnitsError::InvalidDigit(input.to_string()));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| UnitsError::Overflow(input.to_string()))?
    };

    // Right-pad the fraction to exactly 18 digits
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = DECIMALS as usize)
            .parse()
            .map_err(|_| UnitsError::InvalidDigit(input.to_string()))?
    };

    whole
        .checked_mul(WAD)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| UnitsError::Overflow(input.to_string()))
}

/// Format a base-unit value as a decimal token string, trimming trailing zeros.
pub fn format_units(value: U256) -> String {
    let wad = U256::from(WAD);
    let whole = value / wad;
    let fraction = (value % wad).low_u128();

    if fraction == 0 {
        return whole.to_string();
    }

    let fraction = format!("{:018}", fraction);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Serde helpers: `U256` as a decimal string.
///
/// Use with `#[serde(with = "curvebank_core::serde_u256")]`.
pub mod serde_u256 {
    use super::U256;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(raw.trim()).map_err(|e| D::Error::custom(format!("{raw}: {e:?}")))
    }
}

/// Serde helpers: `TokenAmount` as a decimal string.
///
/// JSON consumers, `serde_json::Value` included, cannot hold integers above
/// `u64::MAX`, which is about 18 whole tokens.
pub mod serde_u128 {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("{raw}: {e}")))
    }

    /// Maps with `TokenAmount` values
    pub mod map {
        use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
        use std::collections::HashMap;
        use std::hash::Hash;

        pub fn serialize<K, S>(map: &HashMap<K, u128>, serializer: S) -> Result<S::Ok, S::Error>
        where
            K: Serialize,
            S: Serializer,
        {
            serializer.collect_map(map.iter().map(|(k, v)| (k, v.to_string())))
        }

        pub fn deserialize<'de, K, D>(deserializer: D) -> Result<HashMap<K, u128>, D::Error>
        where
            K: Deserialize<'de> + Eq + Hash,
            D: Deserializer<'de>,
        {
            HashMap::<K, String>::deserialize(deserializer)?
                .into_iter()
                .map(|(k, raw)| {
                    raw.trim()
                        .parse::<u128>()
                        .map(|v| (k, v))
                        .map_err(|e| D::Error::custom(format!("{raw}: {e}")))
                })
                .collect()
        }
    }
}
