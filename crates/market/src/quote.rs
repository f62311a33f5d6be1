//! Read-only pricing
//!
//! Every mutating operation prices itself through these quotes, so a quote
//! taken just before a call matches what the call charges.

use curvebank_core::{serde_u128, serde_u256, Address, FeeConfig, MarketId, PositionId, TokenAmount, U256};
use curvebank_curve::CurveError;
use curvebank_ledger::Position;
use curvebank_settlement::{mortgage_fee, trade_fees, TradeFees};
use serde::{Deserialize, Serialize};

use crate::engine::MarketEngine;
use crate::error::{MarketError, MarketResult};
use crate::outcome::{MarketSnapshot, PositionView};

/// Itemized buy price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyQuote {
    #[serde(with = "serde_u128")]
    pub supply: TokenAmount,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base: U256,
    pub fees: TradeFees,
    /// `base + fees`
    #[serde(with = "serde_u256")]
    pub total: U256,
}

/// Itemized sell price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellQuote {
    #[serde(with = "serde_u128")]
    pub supply: TokenAmount,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base: U256,
    pub fees: TradeFees,
    /// `base - fees`
    #[serde(with = "serde_u256")]
    pub received: U256,
}

/// Value advanced against new collateral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortgageQuote {
    /// Position amount before the call
    #[serde(with = "serde_u128")]
    pub from: TokenAmount,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub payout: U256,
}

/// Price of releasing collateral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemQuote {
    #[serde(with = "serde_u128")]
    pub position_amount: TokenAmount,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub cost: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub due: U256,
}

/// Rebate for joining two positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeQuote {
    pub market: MarketId,
    #[serde(with = "serde_u128")]
    pub target_amount: TokenAmount,
    #[serde(with = "serde_u128")]
    pub source_amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub delta: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub rebate: U256,
}

/// Price of cutting a position in two
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitQuote {
    #[serde(with = "serde_u128")]
    pub position_amount: TokenAmount,
    #[serde(with = "serde_u128")]
    pub split_amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub delta: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub due: U256,
}

/// Price of a leveraged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplyQuote {
    #[serde(with = "serde_u128")]
    pub supply: TokenAmount,
    /// Position amount before the call (0 for a new position)
    #[serde(with = "serde_u128")]
    pub from: TokenAmount,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base_buy: U256,
    #[serde(with = "serde_u256")]
    pub base_mortgage: U256,
    pub trade_fees: TradeFees,
    #[serde(with = "serde_u256")]
    pub mortgage_fee: U256,
    #[serde(with = "serde_u256")]
    pub total: U256,
}

fn add(a: U256, b: U256) -> MarketResult<U256> {
    a.checked_add(b).ok_or(MarketError::Overflow)
}

impl MarketEngine {
    /// Supply and fees of a market; unknown markets price from zero with the default fees
    fn supply_and_fees(&self, market: &MarketId) -> (TokenAmount, FeeConfig) {
        match self.ledger().market(market) {
            Some(record) => (record.total_supply(), record.fees),
            None => (0, *self.default_fees()),
        }
    }

    fn market_fees(&self, market: &MarketId) -> MarketResult<FeeConfig> {
        self.ledger()
            .market(market)
            .map(|record| record.fees)
            .ok_or_else(|| MarketError::UnknownMarket(market.clone()))
    }

    pub(crate) fn live_position(&self, id: PositionId) -> MarketResult<&Position> {
        self.ledger()
            .position(id)
            .ok_or(MarketError::UnknownPosition(id))
    }

    // === Supply queries ===

    /// Raw curve cost `C(a, b)`
    pub fn get_cost(&self, from: TokenAmount, to: TokenAmount) -> MarketResult<U256> {
        Ok(self.curve().cost(from, to)?)
    }

    pub fn quote_buy(&self, market: &MarketId, amount: TokenAmount) -> MarketResult<BuyQuote> {
        let (supply, fees) = self.supply_and_fees(market);
        let quote = self.price_buy(supply, amount, &fees)?;
        tracing::debug!(market = %market, amount, supply, total = %quote.total, "Buy quoted");
        Ok(quote)
    }

    /// Buy price at an arbitrary supply with the engine default fees
    pub fn quote_buy_at(&self, supply: TokenAmount, amount: TokenAmount) -> MarketResult<BuyQuote> {
        self.price_buy(supply, amount, self.default_fees())
    }

    fn price_buy(
        &self,
        supply: TokenAmount,
        amount: TokenAmount,
        fees: &FeeConfig,
    ) -> MarketResult<BuyQuote> {
        let base = self.curve().cost_from(supply, amount)?;
        let fees = trade_fees(base, fees)?;
        let total = add(base, fees.total())?;
        Ok(BuyQuote {
            supply,
            amount,
            base,
            fees,
            total,
        })
    }

    /// Total a buyer pays for `amount`, fees included
    pub fn get_buy_cost(&self, market: &MarketId, amount: TokenAmount) -> MarketResult<U256> {
        Ok(self.quote_buy(market, amount)?.total)
    }

    pub fn quote_sell(&self, market: &MarketId, amount: TokenAmount) -> MarketResult<SellQuote> {
        let (supply, fees) = self.supply_and_fees(market);
        let quote = self.price_sell(supply, amount, &fees)?;
        tracing::debug!(market = %market, amount, supply, received = %quote.received, "Sell quoted");
        Ok(quote)
    }

    /// Sell price at an arbitrary supply with the engine default fees
    pub fn quote_sell_at(&self, supply: TokenAmount, amount: TokenAmount) -> MarketResult<SellQuote> {
        self.price_sell(supply, amount, self.default_fees())
    }

    fn price_sell(
        &self,
        supply: TokenAmount,
        amount: TokenAmount,
        fees: &FeeConfig,
    ) -> MarketResult<SellQuote> {
        let start = supply
            .checked_sub(amount)
            .ok_or(CurveError::InvertedRange {
                from: amount,
                to: supply,
            })?;
        let base = self.curve().cost(start, supply)?;
        let fees = trade_fees(base, fees)?;
        let received = base
            .checked_sub(fees.total())
            .ok_or(MarketError::Overflow)?;
        Ok(SellQuote {
            supply,
            amount,
            base,
            fees,
            received,
        })
    }

    /// Net a seller receives for `amount`, fees deducted
    pub fn get_sell_cost(&self, market: &MarketId, amount: TokenAmount) -> MarketResult<U256> {
        Ok(self.quote_sell(market, amount)?.received)
    }

    pub fn total_supply(&self, market: &MarketId) -> TokenAmount {
        self.supply_and_fees(market).0
    }

    pub fn balance_of(&self, market: &MarketId, holder: &Address) -> TokenAmount {
        self.ledger()
            .market(market)
            .map(|record| record.balance_of(holder))
            .unwrap_or(0)
    }

    /// Value the market can still pay out; zero for unknown markets
    pub fn available_liquidity(&self, market: &MarketId) -> U256 {
        self.ledger()
            .market(market)
            .map(|record| record.available_liquidity())
            .unwrap_or_else(U256::zero)
    }

    // === Collateral quotes ===

    /// Mortgage of `amount` free tokens into a new position
    pub fn quote_mortgage(
        &self,
        market: &MarketId,
        amount: TokenAmount,
    ) -> MarketResult<MortgageQuote> {
        let fees = self.supply_and_fees(market).1;
        self.price_mortgage(0, amount, &fees)
    }

    /// Mortgage of `amount` more tokens into an existing position
    pub fn quote_mortgage_add(
        &self,
        id: PositionId,
        amount: TokenAmount,
    ) -> MarketResult<MortgageQuote> {
        let position = self.live_position(id)?;
        let fees = self.market_fees(&position.market)?;
        self.price_mortgage(position.amount, amount, &fees)
    }

    fn price_mortgage(
        &self,
        from: TokenAmount,
        amount: TokenAmount,
        fees: &FeeConfig,
    ) -> MarketResult<MortgageQuote> {
        let base = self.curve().cost_from(from, amount)?;
        let fee = mortgage_fee(base, fees)?;
        let payout = base.checked_sub(fee).ok_or(MarketError::Overflow)?;
        Ok(MortgageQuote {
            from,
            amount,
            base,
            fee,
            payout,
        })
    }

    pub fn quote_redeem(&self, id: PositionId, amount: TokenAmount) -> MarketResult<RedeemQuote> {
        let position = self.live_position(id)?;
        let total = position.amount;
        if amount > total {
            return Err(MarketError::ExceedsPosition {
                id,
                amount: total,
                requested: amount,
            });
        }
        let fees = self.market_fees(&position.market)?;
        let cost = self.curve().cost(total - amount, total)?;
        let fee = mortgage_fee(cost, &fees)?;
        Ok(RedeemQuote {
            position_amount: total,
            amount,
            cost,
            fee,
            due: add(cost, fee)?,
        })
    }

    pub fn quote_merge(&self, target: PositionId, source: PositionId) -> MarketResult<MergeQuote> {
        if target == source {
            return Err(MarketError::SamePosition(target));
        }
        let target_position = self.live_position(target)?;
        let source_position = self.live_position(source)?;
        if target_position.market != source_position.market {
            return Err(MarketError::SameMarketRequired {
                target_market: target_position.market.clone(),
                source_market: source_position.market.clone(),
            });
        }

        let fees = self.market_fees(&target_position.market)?;
        let delta = self
            .curve()
            .merge_delta(target_position.amount, source_position.amount)?;
        let fee = mortgage_fee(delta, &fees)?;
        let rebate = delta.checked_sub(fee).ok_or(MarketError::Overflow)?;
        Ok(MergeQuote {
            market: target_position.market.clone(),
            target_amount: target_position.amount,
            source_amount: source_position.amount,
            delta,
            fee,
            rebate,
        })
    }

    pub fn quote_split(&self, id: PositionId, split_amount: TokenAmount) -> MarketResult<SplitQuote> {
        let position = self.live_position(id)?;
        let total = position.amount;
        if split_amount >= total {
            return Err(MarketError::InvalidSplitAmount {
                split: split_amount,
                amount: total,
            });
        }
        let fees = self.market_fees(&position.market)?;
        let delta = self.curve().split_delta(total, split_amount)?;
        let fee = mortgage_fee(delta, &fees)?;
        Ok(SplitQuote {
            position_amount: total,
            split_amount,
            delta,
            fee,
            due: add(delta, fee)?,
        })
    }

    /// Leveraged entry into a new position
    pub fn quote_multiply(
        &self,
        market: &MarketId,
        amount: TokenAmount,
    ) -> MarketResult<MultiplyQuote> {
        let (supply, fees) = self.supply_and_fees(market);
        self.price_multiply(supply, 0, amount, &fees)
    }

    /// Leveraged increase of an existing position
    pub fn quote_multiply_add(
        &self,
        id: PositionId,
        amount: TokenAmount,
    ) -> MarketResult<MultiplyQuote> {
        let position = self.live_position(id)?;
        let (supply, fees) = self.supply_and_fees(&position.market);
        self.price_multiply(supply, position.amount, amount, &fees)
    }

    fn price_multiply(
        &self,
        supply: TokenAmount,
        from: TokenAmount,
        amount: TokenAmount,
        fees: &FeeConfig,
    ) -> MarketResult<MultiplyQuote> {
        let base_buy = self.curve().cost_from(supply, amount)?;
        let base_mortgage = self.curve().cost_from(from, amount)?;
        let trade = trade_fees(base_buy, fees)?;
        let fee = mortgage_fee(base_mortgage, fees)?;

        // The collateral value is advanced against the purchase, not paid out
        let net = base_buy.saturating_sub(base_mortgage);
        let total = add(add(net, trade.total())?, fee)?;
        Ok(MultiplyQuote {
            supply,
            from,
            amount,
            base_buy,
            base_mortgage,
            trade_fees: trade,
            mortgage_fee: fee,
            total,
        })
    }

    // === Views ===

    pub fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.ledger()
            .position(id)
            .and_then(|_| self.receipts().owner_of(id))
    }

    pub fn position(&self, id: PositionId) -> Option<PositionView> {
        let position = self.ledger().position(id)?;
        let basis = self.curve().basis(position.amount).ok()?;
        Some(PositionView::new(position, self.receipts().owner_of(id), basis))
    }

    /// Live positions whose receipt `owner` holds, in id order
    pub fn positions_of(&self, owner: &Address) -> Vec<PositionView> {
        self.receipts()
            .receipts_of(owner)
            .into_iter()
            .filter_map(|id| self.position(id))
            .collect()
    }

    pub fn market(&self, id: &MarketId) -> Option<MarketSnapshot> {
        let record = self.ledger().market(id)?;
        let positions = self.ledger().positions_in(id).count();
        Some(MarketSnapshot::new(record, positions))
    }
}
