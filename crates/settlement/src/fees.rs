//! Fee splitter
//!
//! Buy/sell fees are split between the market creator and the community.
//! Each share is computed directly from the base so that the fee charged
//! to the trader is exactly the fee routed to the two recipients:
//!
//! ```text
//! creator   = floor(base * fee * creator_share   / 10^12)
//! community = floor(base * fee * community_share / 10^12)
//! ```
//!
//! Mortgage-family fees are flat: `floor(base * mortgage_fee / 10^6)`.

use curvebank_core::{serde_u256, FeeConfig, FeeRate, PPM, U256};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

/// Itemized buy/sell fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFees {
    #[serde(with = "serde_u256")]
    pub creator: U256,
    #[serde(with = "serde_u256")]
    pub community: U256,
}

impl TradeFees {
    pub fn zero() -> Self {
        Self {
            creator: U256::zero(),
            community: U256::zero(),
        }
    }

    /// Fee charged to the trader
    pub fn total(&self) -> U256 {
        self.creator + self.community
    }
}

/// Split the buy/sell fee on `base`
pub fn trade_fees(base: U256, config: &FeeConfig) -> Result<TradeFees, SettlementError> {
    Ok(TradeFees {
        creator: share_of(base, config.buy_sell_fee, config.creator_share)?,
        community: share_of(base, config.buy_sell_fee, config.community_share)?,
    })
}

/// Flat mortgage fee on `base`
pub fn mortgage_fee(base: U256, config: &FeeConfig) -> Result<U256, SettlementError> {
    config
        .mortgage_fee
        .apply(base)
        .ok_or(SettlementError::Overflow)
}

fn share_of(base: U256, fee: FeeRate, share: FeeRate) -> Result<U256, SettlementError> {
    let denominator = U256::from(PPM) * U256::from(PPM);
    base.checked_mul(U256::from(fee.ppm()))
        .and_then(|v| v.checked_mul(U256::from(share.ppm())))
        .map(|v| v / denominator)
        .ok_or(SettlementError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_fees_one_token_buy() {
        let base = U256::from(1_000_001_000_001_000u64);
        let fees = trade_fees(base, &FeeConfig::standard()).unwrap();

        assert_eq!(fees.creator, U256::from(500_000_500_000u64));
        assert_eq!(fees.community, U256::from(9_500_009_500_009u64));
        assert_eq!(
            base + fees.total(),
            U256::from(1_010_001_010_001_009u64)
        );
    }

    #[test]
    fn test_split_ratio() {
        let base = U256::exp10(24);
        let fees = trade_fees(base, &FeeConfig::standard()).unwrap();

        assert_eq!(fees.community / fees.creator, U256::from(19u64));
        assert_eq!(base / fees.total(), U256::from(100u64));
    }

    #[test]
    fn test_mortgage_fee_ratio() {
        let base = U256::from_dec_str("90909090512396694359").unwrap();
        let fee = mortgage_fee(base, &FeeConfig::standard()).unwrap();

        assert_eq!(fee, U256::from_dec_str("90909090512396694").unwrap());
        assert_eq!(base / fee, U256::from(1000u64));
    }

    #[test]
    fn test_zero_base_has_zero_fees() {
        let fees = trade_fees(U256::zero(), &FeeConfig::standard()).unwrap();
        assert_eq!(fees, TradeFees::zero());
    }

    #[test]
    fn test_overflow_surfaces() {
        let result = trade_fees(U256::max_value(), &FeeConfig::standard());
        assert_eq!(result, Err(SettlementError::Overflow));
    }
}
