//! Shared fixtures for market integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use curvebank_core::{Address, FixedClock, MarketId, U256};
use curvebank_market::{EngineConfig, MarketEngine, MarketSpec};
use curvebank_settlement::{NativeCurrency, PaymentAsset};

pub const MARKET: &str = "app-1";
pub const USERS: [&str; 3] = ["alice", "bob", "carol"];

pub fn addr(s: &str) -> Address {
    Address::from(s)
}

pub fn market() -> MarketId {
    MarketId::from(MARKET)
}

pub fn wei(v: u128) -> U256 {
    U256::from(v)
}

/// Native currency with every test user funded
pub fn funded_native(per_user: U256) -> NativeCurrency {
    let mut native = NativeCurrency::new();
    for user in USERS {
        native.deposit(&addr(user), per_user).unwrap();
    }
    native
}

/// Engine with one empty market and no pending events
pub fn engine_with(asset: Box<dyn PaymentAsset>) -> MarketEngine {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut engine = MarketEngine::new(&EngineConfig::default(), asset)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(at)));
    engine
        .create_market(MarketSpec::new(MARKET, "creator", "community"))
        .unwrap();
    engine.drain_events();
    engine
}

pub fn setup() -> MarketEngine {
    engine_with(Box::new(funded_native(U256::exp10(30))))
}

/// An offer large enough for any single test operation
pub fn plenty() -> U256 {
    U256::exp10(27)
}

/// Accounting invariants that hold after every operation
pub fn assert_invariants(engine: &MarketEngine) {
    let curve = engine.curve();
    let mut expected_custody = U256::zero();

    for record in engine.ledger().markets() {
        assert_eq!(
            record.balances_sum(),
            Some(record.total_supply()),
            "supply conservation in {}",
            record.id
        );
        assert_eq!(
            record.curve_reserve(),
            curve.basis(record.total_supply()).unwrap(),
            "curve reserve in {}",
            record.id
        );

        let mut outstanding = U256::zero();
        let mut locked = 0u128;
        for position in engine.ledger().positions_in(&record.id) {
            assert!(position.amount > 0, "empty position {}", position.id);
            assert!(engine.owner_of(position.id).is_some(), "ownerless {}", position.id);
            outstanding = outstanding + curve.basis(position.amount).unwrap();
            locked += position.amount;
        }
        assert_eq!(record.collateral_outstanding(), outstanding, "outstanding in {}", record.id);
        assert_eq!(record.reserve_balance(), locked, "reserve holdings in {}", record.id);
        assert!(record.collateral_outstanding() <= record.curve_reserve());

        expected_custody = expected_custody + record.curve_reserve() - record.collateral_outstanding();
    }

    let asset = engine.asset();
    assert_eq!(asset.balance_of(asset.custody()), expected_custody, "custody balance");
}
