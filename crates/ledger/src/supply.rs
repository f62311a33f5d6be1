//! Supply ledger - one record per market
//!
//! `total_supply` always equals the sum of `balances`, the mortgage reserve
//! included. Zero balances are not stored.

use curvebank_core::{serde_u128, serde_u256, Address, FeeConfig, MarketId, TokenAmount, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-market supply, balances and treasury counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: MarketId,
    pub creator: Address,
    pub community: Address,
    pub fees: FeeConfig,
    #[serde(with = "serde_u128")]
    pub(crate) total_supply: TokenAmount,
    #[serde(with = "serde_u128::map")]
    pub(crate) balances: HashMap<Address, TokenAmount>,
    /// Sum of buy bases minus sum of sell bases
    #[serde(with = "serde_u256")]
    pub(crate) curve_reserve: U256,
    /// Value advanced against live positions
    #[serde(with = "serde_u256")]
    pub(crate) collateral_outstanding: U256,
}

impl MarketRecord {
    /// An empty market
    pub fn new(id: MarketId, creator: Address, community: Address, fees: FeeConfig) -> Self {
        Self {
            id,
            creator,
            community,
            fees,
            total_supply: 0,
            balances: HashMap::new(),
            curve_reserve: U256::zero(),
            collateral_outstanding: U256::zero(),
        }
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Balance of a holder (0 if never seen)
    pub fn balance_of(&self, holder: &Address) -> TokenAmount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Tokens locked by mortgage-family operations
    pub fn reserve_balance(&self) -> TokenAmount {
        self.balance_of(&Address::mortgage_reserve())
    }

    pub fn curve_reserve(&self) -> U256 {
        self.curve_reserve
    }

    pub fn collateral_outstanding(&self) -> U256 {
        self.collateral_outstanding
    }

    /// Value the market can still pay out
    pub fn available_liquidity(&self) -> U256 {
        self.curve_reserve.saturating_sub(self.collateral_outstanding)
    }

    /// Holders with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&Address, TokenAmount)> {
        self.balances.iter().map(|(holder, amount)| (holder, *amount))
    }

    /// Sum of all balances; `None` on overflow
    pub fn balances_sum(&self) -> Option<TokenAmount> {
        self.balances
            .values()
            .try_fold(0u128, |acc, amount| acc.checked_add(*amount))
    }

    pub(crate) fn set_balance(&mut self, holder: &Address, amount: TokenAmount) {
        if amount == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MarketRecord {
        MarketRecord::new(
            MarketId::from("m"),
            Address::from("creator"),
            Address::from("community"),
            FeeConfig::standard(),
        )
    }

    #[test]
    fn test_zero_balances_are_dropped() {
        let mut market = record();
        let alice = Address::from("alice");

        market.set_balance(&alice, 5);
        assert_eq!(market.balance_of(&alice), 5);
        assert_eq!(market.holders().count(), 1);

        market.set_balance(&alice, 0);
        assert_eq!(market.balance_of(&alice), 0);
        assert_eq!(market.holders().count(), 0);
    }

    #[test]
    fn test_available_liquidity_saturates() {
        let mut market = record();
        market.curve_reserve = U256::from(100u64);
        market.collateral_outstanding = U256::from(40u64);
        assert_eq!(market.available_liquidity(), U256::from(60u64));

        market.collateral_outstanding = U256::from(140u64);
        assert!(market.available_liquidity().is_zero());
    }

    #[test]
    fn test_snapshot_serializes_values_as_strings() {
        let mut market = record();
        market.curve_reserve = U256::exp10(30);
        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["curve_reserve"], "1000000000000000000000000000000");
        assert_eq!(json["fees"]["buy_sell_fee"], 10_000);
    }
}
