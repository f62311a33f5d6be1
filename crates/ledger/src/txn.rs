//! Ledger state and transactions
//!
//! Every mutation goes through a `Transaction`, which records the previous
//! value of each field it touches. Dropping a transaction without calling
//! `commit` replays that undo log in reverse, restoring the state exactly.

use curvebank_core::{Address, MarketId, PositionId, TokenAmount, U256};
use std::collections::HashMap;

use crate::error::LedgerError;
use crate::position::{Position, PositionArena};
use crate::supply::MarketRecord;

/// Markets keyed by id plus the position arena
#[derive(Debug, Default)]
pub struct LedgerState {
    markets: HashMap<MarketId, MarketRecord>,
    positions: PositionArena,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market(&self, id: &MarketId) -> Option<&MarketRecord> {
        self.markets.get(id)
    }

    pub fn markets(&self) -> impl Iterator<Item = &MarketRecord> {
        self.markets.values()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn positions(&self) -> &PositionArena {
        &self.positions
    }

    /// Live positions of one market
    pub fn positions_in<'a>(&'a self, market: &'a MarketId) -> impl Iterator<Item = &'a Position> {
        self.positions.iter().filter(move |p| &p.market == market)
    }

    /// Start a transaction
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction {
            state: self,
            undo: Vec::new(),
            committed: false,
        }
    }
}

/// One recorded change, holding the value to restore
#[derive(Debug)]
enum Undo {
    MarketInserted(MarketId),
    TotalSupply {
        market: MarketId,
        prev: TokenAmount,
    },
    Balance {
        market: MarketId,
        holder: Address,
        prev: TokenAmount,
    },
    CurveReserve {
        market: MarketId,
        prev: U256,
    },
    Outstanding {
        market: MarketId,
        prev: U256,
    },
    PositionAmount {
        id: PositionId,
        prev: TokenAmount,
    },
    PositionCreated(PositionId),
    PositionRemoved(Position),
}

/// An all-or-nothing batch of ledger mutations
#[must_use = "a transaction rolls back unless committed"]
pub struct Transaction<'a> {
    state: &'a mut LedgerState,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    /// Read access to the state as mutated so far
    pub fn state(&self) -> &LedgerState {
        &*self.state
    }

    /// Number of recorded changes
    pub fn changes(&self) -> usize {
        self.undo.len()
    }

    /// Make every change permanent
    pub fn commit(mut self) {
        self.committed = true;
        self.undo.clear();
    }

    fn market_mut(&mut self, id: &MarketId) -> Result<&mut MarketRecord, LedgerError> {
        self.state
            .markets
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownMarket(id.clone()))
    }

    // === Markets ===

    pub fn insert_market(&mut self, record: MarketRecord) -> Result<(), LedgerError> {
        if self.state.markets.contains_key(&record.id) {
            return Err(LedgerError::MarketExists(record.id));
        }
        let id = record.id.clone();
        self.state.markets.insert(id.clone(), record);
        self.undo.push(Undo::MarketInserted(id));
        Ok(())
    }

    // === Supply and balances ===

    /// Create `amount` new tokens for `holder`
    pub fn mint(
        &mut self,
        market: &MarketId,
        holder: &Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev_supply = record.total_supply;
        let prev_balance = record.balance_of(holder);
        let supply = prev_supply.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let balance = prev_balance.checked_add(amount).ok_or(LedgerError::Overflow)?;

        record.total_supply = supply;
        record.set_balance(holder, balance);
        self.undo.push(Undo::TotalSupply {
            market: market.clone(),
            prev: prev_supply,
        });
        self.undo.push(Undo::Balance {
            market: market.clone(),
            holder: holder.clone(),
            prev: prev_balance,
        });
        Ok(())
    }

    /// Destroy `amount` tokens held by `holder`
    pub fn burn(
        &mut self,
        market: &MarketId,
        holder: &Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev_supply = record.total_supply;
        let prev_balance = record.balance_of(holder);
        if prev_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                market: market.clone(),
                holder: holder.clone(),
                available: prev_balance,
                required: amount,
            });
        }
        let supply = prev_supply.checked_sub(amount).ok_or(LedgerError::Overflow)?;

        record.total_supply = supply;
        record.set_balance(holder, prev_balance - amount);
        self.undo.push(Undo::TotalSupply {
            market: market.clone(),
            prev: prev_supply,
        });
        self.undo.push(Undo::Balance {
            market: market.clone(),
            holder: holder.clone(),
            prev: prev_balance,
        });
        Ok(())
    }

    /// Move tokens between holders; supply is unchanged
    pub fn move_balance(
        &mut self,
        market: &MarketId,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let from_prev = record.balance_of(from);
        if from_prev < amount {
            return Err(LedgerError::InsufficientBalance {
                market: market.clone(),
                holder: from.clone(),
                available: from_prev,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_prev = record.balance_of(to);
        let to_next = to_prev.checked_add(amount).ok_or(LedgerError::Overflow)?;

        record.set_balance(from, from_prev - amount);
        record.set_balance(to, to_next);
        self.undo.push(Undo::Balance {
            market: market.clone(),
            holder: from.clone(),
            prev: from_prev,
        });
        self.undo.push(Undo::Balance {
            market: market.clone(),
            holder: to.clone(),
            prev: to_prev,
        });
        Ok(())
    }

    // === Treasury counters ===

    pub fn add_curve_reserve(&mut self, market: &MarketId, value: U256) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev = record.curve_reserve;
        record.curve_reserve = prev.checked_add(value).ok_or(LedgerError::Overflow)?;
        self.undo.push(Undo::CurveReserve {
            market: market.clone(),
            prev,
        });
        Ok(())
    }

    pub fn sub_curve_reserve(&mut self, market: &MarketId, value: U256) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev = record.curve_reserve;
        record.curve_reserve = prev
            .checked_sub(value)
            .ok_or_else(|| LedgerError::TreasuryUnderflow {
                market: market.clone(),
                counter: "curve_reserve",
                available: prev,
                required: value,
            })?;
        self.undo.push(Undo::CurveReserve {
            market: market.clone(),
            prev,
        });
        Ok(())
    }

    pub fn add_outstanding(&mut self, market: &MarketId, value: U256) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev = record.collateral_outstanding;
        record.collateral_outstanding = prev.checked_add(value).ok_or(LedgerError::Overflow)?;
        self.undo.push(Undo::Outstanding {
            market: market.clone(),
            prev,
        });
        Ok(())
    }

    pub fn sub_outstanding(&mut self, market: &MarketId, value: U256) -> Result<(), LedgerError> {
        let record = self.market_mut(market)?;
        let prev = record.collateral_outstanding;
        record.collateral_outstanding =
            prev.checked_sub(value)
                .ok_or_else(|| LedgerError::TreasuryUnderflow {
                    market: market.clone(),
                    counter: "collateral_outstanding",
                    available: prev,
                    required: value,
                })?;
        self.undo.push(Undo::Outstanding {
            market: market.clone(),
            prev,
        });
        Ok(())
    }

    // === Positions ===

    pub fn create_position(
        &mut self,
        market: &MarketId,
        amount: TokenAmount,
    ) -> Result<PositionId, LedgerError> {
        if !self.state.markets.contains_key(market) {
            return Err(LedgerError::UnknownMarket(market.clone()));
        }
        let id = self.state.positions.insert(market.clone(), amount)?;
        self.undo.push(Undo::PositionCreated(id));
        Ok(id)
    }

    pub fn set_position_amount(
        &mut self,
        id: PositionId,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        let position = self
            .state
            .positions
            .get_mut(id)
            .ok_or(LedgerError::UnknownPosition(id))?;
        let prev = position.amount;
        position.amount = amount;
        self.undo.push(Undo::PositionAmount { id, prev });
        Ok(())
    }

    pub fn remove_position(&mut self, id: PositionId) -> Result<Position, LedgerError> {
        let position = self
            .state
            .positions
            .remove(id)
            .ok_or(LedgerError::UnknownPosition(id))?;
        self.undo.push(Undo::PositionRemoved(position.clone()));
        Ok(position)
    }

    fn rollback(&mut self) {
        let state = &mut *self.state;
        while let Some(change) = self.undo.pop() {
            match change {
                Undo::MarketInserted(id) => {
                    state.markets.remove(&id);
                }
                Undo::TotalSupply { market, prev } => {
                    if let Some(record) = state.markets.get_mut(&market) {
                        record.total_supply = prev;
                    }
                }
                Undo::Balance {
                    market,
                    holder,
                    prev,
                } => {
                    if let Some(record) = state.markets.get_mut(&market) {
                        record.set_balance(&holder, prev);
                    }
                }
                Undo::CurveReserve { market, prev } => {
                    if let Some(record) = state.markets.get_mut(&market) {
                        record.curve_reserve = prev;
                    }
                }
                Undo::Outstanding { market, prev } => {
                    if let Some(record) = state.markets.get_mut(&market) {
                        record.collateral_outstanding = prev;
                    }
                }
                Undo::PositionAmount { id, prev } => {
                    if let Some(position) = state.positions.get_mut(id) {
                        position.amount = prev;
                    }
                }
                Undo::PositionCreated(id) => state.positions.undo_insert(id),
                Undo::PositionRemoved(position) => state.positions.undo_remove(position),
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::warn!(changes = self.undo.len(), "Rolling back ledger transaction");
            self.rollback();
        }
    }
}
