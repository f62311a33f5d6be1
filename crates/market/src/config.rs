//! Engine configuration
//!
//! Fee rates are written as decimals (`"0.01"` = 1%) and converted to exact
//! parts-per-million on load. Every field has a default, so a partial JSON
//! file only overrides what it names.

use curvebank_core::{Address, FeeConfig, FeeRate};
use curvebank_curve::{Curve, CurveParams};
use curvebank_settlement::AssetKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Configuration for the market engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // === Recipients ===
    /// Receives every mortgage-family fee
    #[serde(default = "default_protocol_fee_recipient")]
    pub protocol_fee_recipient: Address,

    // === Default fees for new markets ===
    /// Fee on buy and sell bases
    #[serde(default = "default_buy_sell_fee")]
    pub buy_sell_fee: Decimal,

    /// Flat fee on mortgage, redeem, merge, split and multiply bases
    #[serde(default = "default_mortgage_fee")]
    pub mortgage_fee: Decimal,

    /// Creator's share of the buy/sell fee
    #[serde(default = "default_creator_share")]
    pub creator_share: Decimal,

    /// Community's share of the buy/sell fee
    #[serde(default = "default_community_share")]
    pub community_share: Decimal,

    // === Curve ===
    #[serde(default)]
    pub curve: CurveParams,

    /// Settlement asset the CLI builds the engine with
    #[serde(default = "default_asset")]
    pub asset: AssetKind,
}

// Default value functions for serde
fn default_protocol_fee_recipient() -> Address {
    Address::from("protocol")
}

fn default_buy_sell_fee() -> Decimal {
    Decimal::new(1, 2) // 1%
}

fn default_mortgage_fee() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}

fn default_creator_share() -> Decimal {
    Decimal::new(5, 2)
}

fn default_community_share() -> Decimal {
    Decimal::new(95, 2)
}

fn default_asset() -> AssetKind {
    AssetKind::Native
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol_fee_recipient: default_protocol_fee_recipient(),
            buy_sell_fee: default_buy_sell_fee(),
            mortgage_fee: default_mortgage_fee(),
            creator_share: default_creator_share(),
            community_share: default_community_share(),
            curve: CurveParams::default(),
            asset: default_asset(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fee configuration applied to markets created without their own
    pub fn fee_config(&self) -> Result<FeeConfig, ConfigError> {
        let fees = FeeConfig {
            buy_sell_fee: FeeRate::from_decimal(self.buy_sell_fee)?,
            mortgage_fee: FeeRate::from_decimal(self.mortgage_fee)?,
            creator_share: FeeRate::from_decimal(self.creator_share)?,
            community_share: FeeRate::from_decimal(self.community_share)?,
        };
        fees.validate()?;
        Ok(fees)
    }

    pub fn curve(&self) -> Result<Curve, ConfigError> {
        Ok(Curve::new(self.curve)?)
    }

    /// Check fees and curve parameters without building anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fee_config()?;
        self.curve()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curvebank_core::FeeError;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.buy_sell_fee, dec!(0.01));
        assert_eq!(config.mortgage_fee, dec!(0.001));
        assert_eq!(config.protocol_fee_recipient, Address::from("protocol"));
        assert_eq!(config.asset, AssetKind::Native);
        assert_eq!(config.fee_config().unwrap(), FeeConfig::standard());
        assert_eq!(config.curve().unwrap(), Curve::standard());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "mortgage_fee": "0.002", "asset": "token" }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.mortgage_fee, dec!(0.002));
        assert_eq!(config.buy_sell_fee, dec!(0.01)); // default
        assert_eq!(config.asset, AssetKind::Token);
        assert_eq!(config.fee_config().unwrap().mortgage_fee.ppm(), 2_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();

        assert!(json.contains("protocol_fee_recipient"));
        assert!(json.contains("\"0.01\""));

        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_shares_rejected() {
        let config = EngineConfig {
            community_share: dec!(0.90),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.fee_config(),
            Err(ConfigError::Fee(FeeError::SharesMismatch { .. }))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "protocol_fee_recipient": "treasury" }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.protocol_fee_recipient, Address::from("treasury"));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{ "buy_sell_fee": "1.5" }}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(bad.path()),
            Err(ConfigError::Fee(FeeError::RateOutOfRange(_)))
        ));
    }
}
