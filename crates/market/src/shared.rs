//! Thread-safe engine handle
//!
//! Calls from different threads are serialized on the engine lock. A call
//! made from the thread that is already inside an operation is rejected
//! with `MarketError::Reentrant`.

use curvebank_core::{Address, MarketId, PositionId, TokenAmount, U256};
use std::sync::{Arc, Mutex};

use crate::engine::MarketEngine;
use crate::error::MarketResult;
use crate::events::MarketEvent;
use crate::guard::ReentrancyGuard;
use crate::outcome::{
    BuyReceipt, MarketSpec, MergeReceipt, MortgageReceipt, MultiplyReceipt, PositionView,
    RedeemReceipt, SellReceipt, SplitReceipt,
};

#[derive(Clone)]
pub struct SharedMarket {
    engine: Arc<Mutex<MarketEngine>>,
    guard: Arc<ReentrancyGuard>,
}

impl SharedMarket {
    pub fn new(engine: MarketEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            guard: Arc::new(ReentrancyGuard::new()),
        }
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut MarketEngine) -> MarketResult<T>,
    ) -> MarketResult<T> {
        self.guard.check()?;
        let mut engine = self
            .engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _entered = self.guard.enter()?;
        f(&mut engine)
    }

    pub fn create_market(&self, spec: MarketSpec) -> MarketResult<()> {
        self.with_engine(|e| e.create_market(spec))
    }

    pub fn buy(
        &self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<BuyReceipt> {
        self.with_engine(|e| e.buy(caller, market, amount, max_pay))
    }

    pub fn sell(
        &self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        min_receive: U256,
    ) -> MarketResult<SellReceipt> {
        self.with_engine(|e| e.sell(caller, market, amount, min_receive))
    }

    pub fn mortgage(
        &self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        min_payout: U256,
    ) -> MarketResult<MortgageReceipt> {
        self.with_engine(|e| e.mortgage(caller, market, amount, min_payout))
    }

    pub fn mortgage_add(
        &self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        min_payout: U256,
    ) -> MarketResult<MortgageReceipt> {
        self.with_engine(|e| e.mortgage_add(caller, id, amount, min_payout))
    }

    pub fn redeem(
        &self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<RedeemReceipt> {
        self.with_engine(|e| e.redeem(caller, id, amount, max_pay))
    }

    pub fn merge(
        &self,
        caller: &Address,
        target: PositionId,
        source: PositionId,
        min_rebate: U256,
    ) -> MarketResult<MergeReceipt> {
        self.with_engine(|e| e.merge(caller, target, source, min_rebate))
    }

    pub fn split(
        &self,
        caller: &Address,
        id: PositionId,
        split_amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<SplitReceipt> {
        self.with_engine(|e| e.split(caller, id, split_amount, max_pay))
    }

    pub fn multiply(
        &self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<MultiplyReceipt> {
        self.with_engine(|e| e.multiply(caller, market, amount, max_pay))
    }

    pub fn multiply_add(
        &self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<MultiplyReceipt> {
        self.with_engine(|e| e.multiply_add(caller, id, amount, max_pay))
    }

    pub fn transfer_position(&self, caller: &Address, to: &Address, id: PositionId) -> MarketResult<()> {
        self.with_engine(|e| e.transfer_position(caller, to, id))
    }

    pub fn approve_position(
        &self,
        caller: &Address,
        id: PositionId,
        delegate: Option<Address>,
    ) -> MarketResult<()> {
        self.with_engine(|e| e.approve_position(caller, id, delegate))
    }

    pub fn set_operator(&self, caller: &Address, operator: &Address, approved: bool) -> MarketResult<()> {
        self.with_engine(|e| e.set_operator(caller, operator, approved))
    }

    pub fn total_supply(&self, market: &MarketId) -> MarketResult<TokenAmount> {
        self.with_engine(|e| Ok(e.total_supply(market)))
    }

    pub fn balance_of(&self, market: &MarketId, holder: &Address) -> MarketResult<TokenAmount> {
        self.with_engine(|e| Ok(e.balance_of(market, holder)))
    }

    pub fn positions_of(&self, owner: &Address) -> MarketResult<Vec<PositionView>> {
        self.with_engine(|e| Ok(e.positions_of(owner)))
    }

    pub fn drain_events(&self) -> MarketResult<Vec<MarketEvent>> {
        self.with_engine(|e| Ok(e.drain_events()))
    }
}
