//! Market engine - supply trading and the mortgage family
//!
//! Every operation runs in the same order:
//! 1. validate and price (no state touched)
//! 2. apply ledger effects inside a transaction
//! 3. settle value through the payment asset
//! 4. update receipts, commit, record the event
//!
//! A failure in step 3 or 4 drops the transaction, which restores every
//! ledger record it touched.

use curvebank_core::{Address, Clock, FeeConfig, MarketId, PositionId, SystemClock, TokenAmount, U256};
use curvebank_curve::Curve;
use curvebank_ledger::{LedgerState, MarketRecord, OwnershipRegistry, ReceiptRegistry, Transaction};
use curvebank_settlement::{PaymentAsset, PayoutKind, SettlementPlan, SettlementReport};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, MarketError, MarketResult, UnauthorizedSide};
use crate::events::{EventKind, EventLog, MarketEvent};
use crate::outcome::{
    BuyReceipt, MarketSpec, MergeReceipt, MortgageReceipt, MultiplyReceipt, RedeemReceipt,
    SellReceipt, SplitReceipt,
};

/// Receipt registry change applied once settlement has succeeded
enum ReceiptOp {
    None,
    Mint(Address, PositionId),
    Burn(PositionId),
}

/// Bonding-curve market engine
pub struct MarketEngine {
    curve: Curve,
    default_fees: FeeConfig,
    protocol_fee_recipient: Address,
    ledger: LedgerState,
    asset: Box<dyn PaymentAsset>,
    receipts: Box<dyn OwnershipRegistry>,
    events: EventLog,
}

impl MarketEngine {
    /// Build an engine settling through `asset`, with an in-memory receipt
    /// registry and the system clock
    pub fn new(config: &EngineConfig, asset: Box<dyn PaymentAsset>) -> Result<Self, ConfigError> {
        Ok(Self {
            curve: config.curve()?,
            default_fees: config.fee_config()?,
            protocol_fee_recipient: config.protocol_fee_recipient.clone(),
            ledger: LedgerState::new(),
            asset,
            receipts: Box::new(ReceiptRegistry::new()),
            events: EventLog::new(Arc::new(SystemClock)),
        })
    }

    pub fn with_receipts(mut self, receipts: Box<dyn OwnershipRegistry>) -> Self {
        self.receipts = receipts;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.events.set_clock(clock);
        self
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn default_fees(&self) -> &FeeConfig {
        &self.default_fees
    }

    pub fn protocol_fee_recipient(&self) -> &Address {
        &self.protocol_fee_recipient
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn asset(&self) -> &dyn PaymentAsset {
        self.asset.as_ref()
    }

    pub fn receipts(&self) -> &dyn OwnershipRegistry {
        self.receipts.as_ref()
    }

    pub fn pending_events(&self) -> &[MarketEvent] {
        self.events.pending()
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        self.events.drain()
    }

    // === Checks ===

    fn market_record(&self, id: &MarketId) -> MarketResult<&MarketRecord> {
        self.ledger
            .market(id)
            .ok_or_else(|| MarketError::UnknownMarket(id.clone()))
    }

    fn authorize(&self, caller: &Address, id: PositionId, side: UnauthorizedSide) -> MarketResult<()> {
        if self.receipts.is_authorized(caller, id) {
            Ok(())
        } else {
            Err(MarketError::Unauthorized {
                side,
                caller: caller.clone(),
                id,
            })
        }
    }

    // === Registration ===

    /// Register an empty market
    pub fn create_market(&mut self, spec: MarketSpec) -> MarketResult<()> {
        let fees = spec.fees.unwrap_or(self.default_fees);
        fees.validate()?;

        let mut tx = self.ledger.begin();
        tx.insert_market(MarketRecord::new(
            spec.id.clone(),
            spec.creator.clone(),
            spec.community.clone(),
            fees,
        ))?;
        tx.commit();

        tracing::info!(market = %spec.id, creator = %spec.creator, "Market created");
        self.events.record(EventKind::MarketCreated {
            market: spec.id,
            creator: spec.creator,
            community: spec.community,
            fees,
        });
        Ok(())
    }

    // === Supply ===

    /// Buy `amount` tokens at the current supply, paying at most `max_pay`
    pub fn buy(
        &mut self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<BuyReceipt> {
        check_caller(caller)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let record = self.market_record(market)?;
        let (creator, community) = (record.creator.clone(), record.community.clone());
        let quote = self.quote_buy(market, amount)?;
        ensure_payment(quote.total, max_pay)?;

        let plan = SettlementPlan::new()
            .collect(caller, quote.total, max_pay)
            .pay(&creator, quote.fees.creator, PayoutKind::CreatorFee)
            .pay(&community, quote.fees.community, PayoutKind::CommunityFee);

        let mut tx = self.ledger.begin();
        tx.mint(market, caller, amount)?;
        tx.add_curve_reserve(market, quote.base)?;
        let report = settle(tx, &plan, self.asset.as_mut(), self.receipts.as_mut(), ReceiptOp::None)?;

        let receipt = BuyReceipt {
            market: market.clone(),
            amount,
            base: quote.base,
            fees: quote.fees,
            paid: quote.total,
            refunded: report.refunded(),
        };
        tracing::info!(market = %market, caller = %caller, amount, paid = %receipt.paid, "Buy committed");
        self.events.record(EventKind::Bought {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    /// Sell `amount` free tokens, receiving at least `min_receive`
    pub fn sell(
        &mut self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        min_receive: U256,
    ) -> MarketResult<SellReceipt> {
        check_caller(caller)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let record = self.market_record(market)?;
        ensure_balance(record, caller, amount)?;
        let (creator, community) = (record.creator.clone(), record.community.clone());
        let quote = self.quote_sell(market, amount)?;
        ensure_liquidity(record, quote.base)?;
        ensure_minimum(min_receive, quote.received)?;

        let plan = SettlementPlan::new()
            .pay(caller, quote.received, PayoutKind::Proceeds)
            .pay(&creator, quote.fees.creator, PayoutKind::CreatorFee)
            .pay(&community, quote.fees.community, PayoutKind::CommunityFee);

        let mut tx = self.ledger.begin();
        tx.burn(market, caller, amount)?;
        tx.sub_curve_reserve(market, quote.base)?;
        settle(tx, &plan, self.asset.as_mut(), self.receipts.as_mut(), ReceiptOp::None)?;

        let receipt = SellReceipt {
            market: market.clone(),
            amount,
            base: quote.base,
            fees: quote.fees,
            received: quote.received,
        };
        tracing::info!(market = %market, caller = %caller, amount, received = %receipt.received, "Sell committed");
        self.events.record(EventKind::Sold {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    // === Mortgage family ===

    /// Lock `amount` free tokens as a new position and receive its value less the fee
    pub fn mortgage(
        &mut self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        min_payout: U256,
    ) -> MarketResult<MortgageReceipt> {
        check_caller(caller)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let record = self.market_record(market)?;
        ensure_balance(record, caller, amount)?;
        let quote = self.quote_mortgage(market, amount)?;
        ensure_liquidity(record, quote.base)?;
        ensure_minimum(min_payout, quote.payout)?;

        let plan = SettlementPlan::new()
            .pay(caller, quote.payout, PayoutKind::Proceeds)
            .pay(&self.protocol_fee_recipient, quote.fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.move_balance(market, caller, &Address::mortgage_reserve(), amount)?;
        let id = tx.create_position(market, amount)?;
        tx.add_outstanding(market, quote.base)?;
        settle(
            tx,
            &plan,
            self.asset.as_mut(),
            self.receipts.as_mut(),
            ReceiptOp::Mint(caller.clone(), id),
        )?;

        let receipt = MortgageReceipt {
            position: id,
            amount,
            position_amount: amount,
            base: quote.base,
            fee: quote.fee,
            payout: quote.payout,
        };
        tracing::info!(market = %market, caller = %caller, position = %id, amount, payout = %receipt.payout, "Mortgage committed");
        self.events.record(EventKind::Mortgaged {
            caller: caller.clone(),
            market: market.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    /// Lock `amount` more free tokens into an existing position
    pub fn mortgage_add(
        &mut self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        min_payout: U256,
    ) -> MarketResult<MortgageReceipt> {
        check_caller(caller)?;
        let market = self.live_position(id)?.market.clone();
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.authorize(caller, id, UnauthorizedSide::Position)?;
        let record = self.market_record(&market)?;
        ensure_balance(record, caller, amount)?;
        let quote = self.quote_mortgage_add(id, amount)?;
        ensure_liquidity(record, quote.base)?;
        ensure_minimum(min_payout, quote.payout)?;
        let position_amount = quote
            .from
            .checked_add(amount)
            .ok_or(MarketError::Overflow)?;

        let plan = SettlementPlan::new()
            .pay(caller, quote.payout, PayoutKind::Proceeds)
            .pay(&self.protocol_fee_recipient, quote.fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.move_balance(&market, caller, &Address::mortgage_reserve(), amount)?;
        tx.set_position_amount(id, position_amount)?;
        tx.add_outstanding(&market, quote.base)?;
        settle(tx, &plan, self.asset.as_mut(), self.receipts.as_mut(), ReceiptOp::None)?;

        let receipt = MortgageReceipt {
            position: id,
            amount,
            position_amount,
            base: quote.base,
            fee: quote.fee,
            payout: quote.payout,
        };
        tracing::info!(position = %id, caller = %caller, amount, payout = %receipt.payout, "Mortgage increase committed");
        self.events.record(EventKind::MortgageIncreased {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    /// Buy back `amount` tokens of collateral into the caller's free balance
    pub fn redeem(
        &mut self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<RedeemReceipt> {
        check_caller(caller)?;
        let market = self.live_position(id)?.market.clone();
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.authorize(caller, id, UnauthorizedSide::Position)?;
        let quote = self.quote_redeem(id, amount)?;
        ensure_payment(quote.due, max_pay)?;
        let remaining = quote.position_amount - amount;

        let plan = SettlementPlan::new()
            .collect(caller, quote.due, max_pay)
            .pay(&self.protocol_fee_recipient, quote.fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.move_balance(&market, &Address::mortgage_reserve(), caller, amount)?;
        let op = if remaining == 0 {
            tx.remove_position(id)?;
            ReceiptOp::Burn(id)
        } else {
            tx.set_position_amount(id, remaining)?;
            ReceiptOp::None
        };
        tx.sub_outstanding(&market, quote.cost)?;
        let report = settle(tx, &plan, self.asset.as_mut(), self.receipts.as_mut(), op)?;

        let receipt = RedeemReceipt {
            position: id,
            amount,
            remaining,
            cost: quote.cost,
            fee: quote.fee,
            paid: quote.due,
            refunded: report.refunded(),
        };
        tracing::info!(position = %id, caller = %caller, amount, remaining, paid = %receipt.paid, "Redeem committed");
        self.events.record(EventKind::Redeemed {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    /// Fold `source` into `target`, paying the caller the released value less the fee.
    ///
    /// The caller must control the target. The source may be controlled by
    /// either the caller or the target's owner.
    pub fn merge(
        &mut self,
        caller: &Address,
        target: PositionId,
        source: PositionId,
        min_rebate: U256,
    ) -> MarketResult<MergeReceipt> {
        check_caller(caller)?;
        let quote = self.quote_merge(target, source)?;
        self.authorize(caller, target, UnauthorizedSide::Target)?;
        let source_allowed = self.receipts.is_authorized(caller, source)
            || self
                .receipts
                .owner_of(target)
                .is_some_and(|owner| self.receipts.is_authorized(&owner, source));
        if !source_allowed {
            return Err(MarketError::Unauthorized {
                side: UnauthorizedSide::Source,
                caller: caller.clone(),
                id: source,
            });
        }
        ensure_liquidity(self.market_record(&quote.market)?, quote.delta)?;
        ensure_minimum(min_rebate, quote.rebate)?;
        let amount = quote
            .target_amount
            .checked_add(quote.source_amount)
            .ok_or(MarketError::Overflow)?;

        let plan = SettlementPlan::new()
            .pay(caller, quote.rebate, PayoutKind::Proceeds)
            .pay(&self.protocol_fee_recipient, quote.fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.set_position_amount(target, amount)?;
        tx.remove_position(source)?;
        tx.add_outstanding(&quote.market, quote.delta)?;
        settle(
            tx,
            &plan,
            self.asset.as_mut(),
            self.receipts.as_mut(),
            ReceiptOp::Burn(source),
        )?;

        let receipt = MergeReceipt {
            target,
            source,
            amount,
            delta: quote.delta,
            fee: quote.fee,
            rebate: quote.rebate,
        };
        tracing::info!(target = %target, source = %source, caller = %caller, amount, rebate = %receipt.rebate, "Merge committed");
        self.events.record(EventKind::Merged {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    /// Cut `split_amount` off a position into a new position owned by the same owner
    pub fn split(
        &mut self,
        caller: &Address,
        id: PositionId,
        split_amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<SplitReceipt> {
        check_caller(caller)?;
        let market = self.live_position(id)?.market.clone();
        if split_amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.authorize(caller, id, UnauthorizedSide::Position)?;
        let quote = self.quote_split(id, split_amount)?;
        ensure_payment(quote.due, max_pay)?;
        let owner = self
            .receipts
            .owner_of(id)
            .ok_or(MarketError::UnknownPosition(id))?;
        let remaining = quote.position_amount - split_amount;

        let plan = SettlementPlan::new()
            .collect(caller, quote.due, max_pay)
            .pay(&self.protocol_fee_recipient, quote.fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.set_position_amount(id, remaining)?;
        let created = tx.create_position(&market, split_amount)?;
        tx.sub_outstanding(&market, quote.delta)?;
        let report = settle(
            tx,
            &plan,
            self.asset.as_mut(),
            self.receipts.as_mut(),
            ReceiptOp::Mint(owner, created),
        )?;

        let receipt = SplitReceipt {
            original: id,
            created,
            remaining,
            split_amount,
            delta: quote.delta,
            fee: quote.fee,
            paid: quote.due,
            refunded: report.refunded(),
        };
        tracing::info!(position = %id, created = %created, caller = %caller, split_amount, "Split committed");
        self.events.record(EventKind::Split {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    // === Leveraged entry ===

    /// Buy `amount` tokens straight into a new position
    pub fn multiply(
        &mut self,
        caller: &Address,
        market: &MarketId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<MultiplyReceipt> {
        check_caller(caller)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.market_record(market)?;
        self.execute_multiply(caller, market, None, amount, max_pay)
    }

    /// Buy `amount` tokens straight into an existing position
    pub fn multiply_add(
        &mut self,
        caller: &Address,
        id: PositionId,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<MultiplyReceipt> {
        check_caller(caller)?;
        let market = self.live_position(id)?.market.clone();
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.authorize(caller, id, UnauthorizedSide::Position)?;
        self.execute_multiply(caller, &market, Some(id), amount, max_pay)
    }

    fn execute_multiply(
        &mut self,
        caller: &Address,
        market: &MarketId,
        existing: Option<PositionId>,
        amount: TokenAmount,
        max_pay: U256,
    ) -> MarketResult<MultiplyReceipt> {
        let quote = match existing {
            Some(id) => self.quote_multiply_add(id, amount)?,
            None => self.quote_multiply(market, amount)?,
        };
        ensure_payment(quote.total, max_pay)?;
        let record = self.market_record(market)?;
        let (creator, community) = (record.creator.clone(), record.community.clone());

        // Liquidity after the purchase must cover the value advanced
        let available = record
            .available_liquidity()
            .checked_add(quote.base_buy)
            .ok_or(MarketError::Overflow)?;
        if available < quote.base_mortgage {
            return Err(MarketError::InsufficientReserve {
                market: market.clone(),
                available,
                required: quote.base_mortgage,
            });
        }
        let position_amount = quote
            .from
            .checked_add(amount)
            .ok_or(MarketError::Overflow)?;

        let plan = SettlementPlan::new()
            .collect(caller, quote.total, max_pay)
            .pay(&creator, quote.trade_fees.creator, PayoutKind::CreatorFee)
            .pay(&community, quote.trade_fees.community, PayoutKind::CommunityFee)
            .pay(&self.protocol_fee_recipient, quote.mortgage_fee, PayoutKind::ProtocolFee);

        let mut tx = self.ledger.begin();
        tx.mint(market, &Address::mortgage_reserve(), amount)?;
        tx.add_curve_reserve(market, quote.base_buy)?;
        let (position, op) = match existing {
            Some(id) => {
                tx.set_position_amount(id, position_amount)?;
                (id, ReceiptOp::None)
            }
            None => {
                let id = tx.create_position(market, amount)?;
                (id, ReceiptOp::Mint(caller.clone(), id))
            }
        };
        tx.add_outstanding(market, quote.base_mortgage)?;
        let report = settle(tx, &plan, self.asset.as_mut(), self.receipts.as_mut(), op)?;

        let receipt = MultiplyReceipt {
            market: market.clone(),
            position,
            created: existing.is_none(),
            amount,
            position_amount,
            base_buy: quote.base_buy,
            base_mortgage: quote.base_mortgage,
            trade_fees: quote.trade_fees,
            mortgage_fee: quote.mortgage_fee,
            paid: quote.total,
            refunded: report.refunded(),
        };
        tracing::info!(market = %market, position = %position, caller = %caller, amount, paid = %receipt.paid, "Multiply committed");
        self.events.record(EventKind::Multiplied {
            caller: caller.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    // === Receipts ===

    /// Hand a position's receipt to `to`; clears its delegate
    pub fn transfer_position(
        &mut self,
        caller: &Address,
        to: &Address,
        id: PositionId,
    ) -> MarketResult<()> {
        check_caller(caller)?;
        check_caller(to)?;
        self.live_position(id)?;
        self.authorize(caller, id, UnauthorizedSide::Position)?;
        let from = self
            .receipts
            .owner_of(id)
            .ok_or(MarketError::UnknownPosition(id))?;
        self.receipts.transfer(caller, to, id)?;

        tracing::info!(position = %id, from = %from, to = %to, "Position transferred");
        self.events.record(EventKind::PositionTransferred {
            position: id,
            from,
            to: to.clone(),
        });
        Ok(())
    }

    /// Set or clear the delegate of a position
    pub fn approve_position(
        &mut self,
        caller: &Address,
        id: PositionId,
        delegate: Option<Address>,
    ) -> MarketResult<()> {
        check_caller(caller)?;
        self.live_position(id)?;
        self.receipts
            .approve(caller, id, delegate)
            .map_err(|e| match e {
                curvebank_ledger::OwnershipError::NotAuthorized { caller, id } => {
                    MarketError::Unauthorized {
                        side: UnauthorizedSide::Position,
                        caller,
                        id,
                    }
                }
                other => other.into(),
            })
    }

    /// Approve or revoke `operator` over all of the caller's positions
    pub fn set_operator(
        &mut self,
        caller: &Address,
        operator: &Address,
        approved: bool,
    ) -> MarketResult<()> {
        check_caller(caller)?;
        self.receipts.set_operator(caller, operator, approved);
        tracing::debug!(owner = %caller, operator = %operator, approved, "Operator updated");
        Ok(())
    }
}

/// Execute settlement and the receipt change, then commit the ledger transaction.
///
/// Dropping `tx` on any error rolls the ledger back.
fn settle(
    tx: Transaction<'_>,
    plan: &SettlementPlan,
    asset: &mut dyn PaymentAsset,
    receipts: &mut dyn OwnershipRegistry,
    op: ReceiptOp,
) -> MarketResult<SettlementReport> {
    let report = plan.execute(asset).inspect_err(|e| {
        tracing::warn!(error = %e, "Settlement rejected, rolling back");
    })?;

    let applied = match op {
        ReceiptOp::None => Ok(()),
        ReceiptOp::Mint(to, id) => receipts.mint(&to, id),
        ReceiptOp::Burn(id) => receipts.burn(id),
    };
    if let Err(e) = applied {
        tracing::error!(error = %e, "Receipt update failed, reverting settlement");
        plan.revert(asset, &report);
        return Err(e.into());
    }

    tx.commit();
    Ok(report)
}

fn check_caller(caller: &Address) -> MarketResult<()> {
    if caller.is_system() {
        return Err(MarketError::InvalidAddress(caller.clone()));
    }
    Ok(())
}

fn ensure_balance(record: &MarketRecord, holder: &Address, amount: TokenAmount) -> MarketResult<()> {
    let available = record.balance_of(holder);
    if available < amount {
        return Err(MarketError::InsufficientBalance {
            holder: holder.clone(),
            available,
            required: amount,
        });
    }
    Ok(())
}

fn ensure_liquidity(record: &MarketRecord, required: U256) -> MarketResult<()> {
    let available = record.available_liquidity();
    if available < required {
        return Err(MarketError::InsufficientReserve {
            market: record.id.clone(),
            available,
            required,
        });
    }
    Ok(())
}

fn ensure_payment(required: U256, offered: U256) -> MarketResult<()> {
    if offered < required {
        return Err(MarketError::InsufficientPayment { required, offered });
    }
    Ok(())
}

fn ensure_minimum(limit: U256, actual: U256) -> MarketResult<()> {
    if actual < limit {
        return Err(MarketError::SlippageExceeded { limit, actual });
    }
    Ok(())
}
