//! Fee rates - exact parts-per-million
//!
//! Rates are configured as decimals (`0.01` = 1%) but stored as integer
//! parts-per-million so fee arithmetic on `U256` values is exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::value::U256;

/// Parts-per-million denominator (1_000_000 = 100%)
pub const PPM: u32 = 1_000_000;

/// Errors raised when building fee rates or fee configurations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Fee rate must be between 0 and 1: {0}")]
    RateOutOfRange(Decimal),

    #[error("Fee rate {0} is finer than one part per million")]
    PrecisionLoss(Decimal),

    #[error("{name} fee must be below 100%, got {ppm} ppm")]
    RateTooHigh { name: &'static str, ppm: u32 },

    #[error("Fee shares must sum to 100%: creator {creator} ppm + community {community} ppm")]
    SharesMismatch { creator: u32, community: u32 },
}

/// A fee rate in parts per million
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u32);

impl FeeRate {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(PPM);

    pub const fn from_ppm(ppm: u32) -> Self {
        Self(ppm)
    }

    #[inline]
    pub const fn ppm(&self) -> u32 {
        self.0
    }

    /// Build a rate from a decimal fraction (`0.001` = 0.1%).
    ///
    /// Rejects values outside `[0, 1]` and values that cannot be expressed
    /// exactly in parts per million.
    pub fn from_decimal(value: Decimal) -> Result<Self, FeeError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(FeeError::RateOutOfRange(value));
        }
        let scaled = value * Decimal::from(PPM);
        if !scaled.fract().is_zero() {
            return Err(FeeError::PrecisionLoss(value));
        }
        scaled
            .to_u32()
            .map(Self)
            .ok_or(FeeError::RateOutOfRange(value))
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(PPM)
    }

    /// `floor(base * rate)`; `None` on overflow
    pub fn apply(&self, base: U256) -> Option<U256> {
        base.checked_mul(U256::from(self.0))
            .map(|scaled| scaled / U256::from(PPM))
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.to_decimal() * Decimal::ONE_HUNDRED).normalize())
    }
}

/// Per-market fee configuration, fixed at market creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee on buy/sell bases, split creator/community
    pub buy_sell_fee: FeeRate,
    /// Flat fee on mortgage-family bases, paid to the protocol recipient
    pub mortgage_fee: FeeRate,
    /// Creator's share of the buy/sell fee
    pub creator_share: FeeRate,
    /// Community's share of the buy/sell fee
    pub community_share: FeeRate,
}

impl FeeConfig {
    /// 1% buy/sell fee split 5%/95%, 0.1% mortgage fee
    pub const fn standard() -> Self {
        Self {
            buy_sell_fee: FeeRate::from_ppm(10_000),
            mortgage_fee: FeeRate::from_ppm(1_000),
            creator_share: FeeRate::from_ppm(50_000),
            community_share: FeeRate::from_ppm(950_000),
        }
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        if self.buy_sell_fee.ppm() >= PPM {
            return Err(FeeError::RateTooHigh {
                name: "Buy/sell",
                ppm: self.buy_sell_fee.ppm(),
            });
        }
        if self.mortgage_fee.ppm() >= PPM {
            return Err(FeeError::RateTooHigh {
                name: "Mortgage",
                ppm: self.mortgage_fee.ppm(),
            });
        }
        let creator = self.creator_share.ppm();
        let community = self.community_share.ppm();
        if creator.checked_add(community) != Some(PPM) {
            return Err(FeeError::SharesMismatch { creator, community });
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_decimal() {
        assert_eq!(FeeRate::from_decimal(dec!(0.01)).unwrap().ppm(), 10_000);
        assert_eq!(FeeRate::from_decimal(dec!(0.001)).unwrap().ppm(), 1_000);
        assert_eq!(FeeRate::from_decimal(dec!(1)).unwrap(), FeeRate::FULL);
    }

    #[test]
    fn test_from_decimal_rejects() {
        assert!(matches!(
            FeeRate::from_decimal(dec!(-0.1)),
            Err(FeeError::RateOutOfRange(_))
        ));
        assert!(matches!(
            FeeRate::from_decimal(dec!(1.5)),
            Err(FeeError::RateOutOfRange(_))
        ));
        assert!(matches!(
            FeeRate::from_decimal(dec!(0.0000001)),
            Err(FeeError::PrecisionLoss(_))
        ));
    }

    #[test]
    fn test_apply_floors() {
        let rate = FeeRate::from_ppm(1_000);
        assert_eq!(rate.apply(U256::from(1_999u64)), Some(U256::from(1u64)));
        assert_eq!(rate.apply(U256::max_value()), None);
    }

    #[test]
    fn test_standard_config_is_valid() {
        let config = FeeConfig::standard();
        assert!(config.validate().is_ok());
        assert_eq!(config.buy_sell_fee.to_string(), "1%");
    }

    #[test]
    fn test_validate_shares() {
        let mut config = FeeConfig::standard();
        config.community_share = FeeRate::from_ppm(900_000);
        assert_eq!(
            config.validate(),
            Err(FeeError::SharesMismatch {
                creator: 50_000,
                community: 900_000
            })
        );
    }

    #[test]
    fn test_validate_rate_ceiling() {
        let mut config = FeeConfig::standard();
        config.mortgage_fee = FeeRate::FULL;
        assert!(matches!(
            config.validate(),
            Err(FeeError::RateTooHigh { name: "Mortgage", .. })
        ));
    }
}
