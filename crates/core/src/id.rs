//! Identifiers - markets, holders and collateral positions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one bonding-curve market (one asset instance)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MarketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A ledger participant: user wallet, fee recipient or engine-owned account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Holder of tokens locked by mortgage-family operations
    pub const MORTGAGE_RESERVE: &'static str = "curvebank:mortgage-reserve";

    /// Engine custody account on the payment asset
    pub const CUSTODY: &'static str = "curvebank:custody";

    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The engine's mortgage-reserve holder
    pub fn mortgage_reserve() -> Self {
        Self::new(Self::MORTGAGE_RESERVE)
    }

    /// The engine's custody account on the payment asset
    pub fn custody() -> Self {
        Self::new(Self::CUSTODY)
    }

    /// Engine-owned accounts are never valid callers
    pub fn is_system(&self) -> bool {
        self.0.starts_with("curvebank:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generational handle of a collateral position.
///
/// Slots are reused after a position is deleted, but every reuse bumps the
/// generation, so a handle to a deleted position never resolves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId {
    index: u32,
    generation: u32,
}

impl PositionId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl FromStr for PositionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, generation) = s
            .split_once('v')
            .ok_or_else(|| format!("Invalid position id: {s}"))?;
        let index = index
            .parse()
            .map_err(|_| format!("Invalid position index: {s}"))?;
        let generation = generation
            .parse()
            .map_err(|_| format!("Invalid position generation: {s}"))?;
        Ok(Self::new(index, generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_addresses() {
        assert!(Address::mortgage_reserve().is_system());
        assert!(Address::custody().is_system());
        assert!(!Address::from("alice").is_system());
    }

    #[test]
    fn test_position_id_display_parse() {
        let id = PositionId::new(7, 3);
        assert_eq!(id.to_string(), "7v3");
        assert_eq!("7v3".parse::<PositionId>().unwrap(), id);
        assert!("7".parse::<PositionId>().is_err());
        assert!("xv1".parse::<PositionId>().is_err());
    }

    #[test]
    fn test_market_id_serde_transparent() {
        let id = MarketId::from("app-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""app-1""#);
    }
}
