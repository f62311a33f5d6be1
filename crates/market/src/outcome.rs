//! Operation receipts and read-only views

use curvebank_core::{serde_u128, serde_u256, Address, FeeConfig, MarketId, PositionId, TokenAmount, U256};
use curvebank_ledger::{MarketRecord, Position};
use curvebank_settlement::TradeFees;
use serde::{Deserialize, Serialize};

/// Result of a buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub market: MarketId,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    /// Curve cost `C(s, s+amount)`
    #[serde(with = "serde_u256")]
    pub base: U256,
    pub fees: TradeFees,
    /// `base + fees`
    #[serde(with = "serde_u256")]
    pub paid: U256,
    #[serde(with = "serde_u256")]
    pub refunded: U256,
}

/// Result of a sell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellReceipt {
    pub market: MarketId,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base: U256,
    pub fees: TradeFees,
    /// `base - fees`
    #[serde(with = "serde_u256")]
    pub received: U256,
}

/// Result of a mortgage or mortgage increase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortgageReceipt {
    pub position: PositionId,
    /// Tokens added to the position by this call
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    /// Position amount afterwards
    #[serde(with = "serde_u128")]
    pub position_amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub base: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub payout: U256,
}

/// Result of a redeem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemReceipt {
    pub position: PositionId,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    /// Position amount afterwards; 0 means the position was closed
    #[serde(with = "serde_u128")]
    pub remaining: TokenAmount,
    #[serde(with = "serde_u256")]
    pub cost: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    /// `cost + fee`
    #[serde(with = "serde_u256")]
    pub paid: U256,
    #[serde(with = "serde_u256")]
    pub refunded: U256,
}

impl RedeemReceipt {
    pub fn closed(&self) -> bool {
        self.remaining == 0
    }
}

/// Result of a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReceipt {
    pub target: PositionId,
    /// Deleted by the merge
    pub source: PositionId,
    /// Target amount afterwards
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub delta: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub rebate: U256,
}

/// Result of a split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReceipt {
    pub original: PositionId,
    pub created: PositionId,
    /// Original amount afterwards
    #[serde(with = "serde_u128")]
    pub remaining: TokenAmount,
    #[serde(with = "serde_u128")]
    pub split_amount: TokenAmount,
    #[serde(with = "serde_u256")]
    pub delta: U256,
    #[serde(with = "serde_u256")]
    pub fee: U256,
    #[serde(with = "serde_u256")]
    pub paid: U256,
    #[serde(with = "serde_u256")]
    pub refunded: U256,
}

/// Result of a multiply or multiply increase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplyReceipt {
    pub market: MarketId,
    pub position: PositionId,
    /// True when the call opened the position
    pub created: bool,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    #[serde(with = "serde_u128")]
    pub position_amount: TokenAmount,
    /// Supply-side curve cost `C(s, s+amount)`
    #[serde(with = "serde_u256")]
    pub base_buy: U256,
    /// Collateral value `C(T, T+amount)`
    #[serde(with = "serde_u256")]
    pub base_mortgage: U256,
    pub trade_fees: TradeFees,
    #[serde(with = "serde_u256")]
    pub mortgage_fee: U256,
    /// `(base_buy - base_mortgage) + trade fees + mortgage fee`
    #[serde(with = "serde_u256")]
    pub paid: U256,
    #[serde(with = "serde_u256")]
    pub refunded: U256,
}

/// Position joined with its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub id: PositionId,
    pub serial: u64,
    pub market: MarketId,
    #[serde(with = "serde_u128")]
    pub amount: TokenAmount,
    pub owner: Option<Address>,
    /// Cost basis `C(0, amount)`
    #[serde(with = "serde_u256")]
    pub basis: U256,
}

impl PositionView {
    pub(crate) fn new(position: &Position, owner: Option<Address>, basis: U256) -> Self {
        Self {
            id: position.id,
            serial: position.serial,
            market: position.market.clone(),
            amount: position.amount,
            owner,
            basis,
        }
    }
}

/// Point-in-time copy of a market record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: MarketId,
    pub creator: Address,
    pub community: Address,
    pub fees: FeeConfig,
    #[serde(with = "serde_u128")]
    pub total_supply: TokenAmount,
    #[serde(with = "serde_u128")]
    pub reserve_balance: TokenAmount,
    #[serde(with = "serde_u256")]
    pub curve_reserve: U256,
    #[serde(with = "serde_u256")]
    pub collateral_outstanding: U256,
    pub positions: usize,
}

impl MarketSnapshot {
    pub(crate) fn new(record: &MarketRecord, positions: usize) -> Self {
        Self {
            id: record.id.clone(),
            creator: record.creator.clone(),
            community: record.community.clone(),
            fees: record.fees,
            total_supply: record.total_supply(),
            reserve_balance: record.reserve_balance(),
            curve_reserve: record.curve_reserve(),
            collateral_outstanding: record.collateral_outstanding(),
            positions,
        }
    }

    /// Value the market can still pay out
    pub fn available_liquidity(&self) -> U256 {
        self.curve_reserve.saturating_sub(self.collateral_outstanding)
    }
}

/// Parameters of a new market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSpec {
    pub id: MarketId,
    pub creator: Address,
    pub community: Address,
    /// Engine default when absent
    #[serde(default)]
    pub fees: Option<FeeConfig>,
}

impl MarketSpec {
    pub fn new(id: impl Into<MarketId>, creator: impl Into<Address>, community: impl Into<Address>) -> Self {
        Self {
            id: id.into(),
            creator: creator.into(),
            community: community.into(),
            fees: None,
        }
    }

    pub fn with_fees(mut self, fees: FeeConfig) -> Self {
        self.fees = Some(fees);
        self
    }
}
