//! Shared handle: cross-thread serialization and re-entrancy rejection

mod common;

use std::sync::{Arc, Mutex};
use std::thread;

use common::*;
use curvebank_core::{Address, U256, WAD};
use curvebank_market::{BuyReceipt, MarketError, MarketResult, SharedMarket};
use curvebank_settlement::{AssetKind, Collected, NativeCurrency, PaymentAsset, SettlementError};

type Slot<T> = Arc<Mutex<Option<T>>>;

/// Native currency that calls back into the market while paying out
struct CallbackAsset {
    inner: NativeCurrency,
    market: Slot<SharedMarket>,
    observed: Slot<MarketResult<BuyReceipt>>,
}

impl PaymentAsset for CallbackAsset {
    fn kind(&self) -> AssetKind {
        self.inner.kind()
    }

    fn custody(&self) -> &Address {
        self.inner.custody()
    }

    fn balance_of(&self, holder: &Address) -> U256 {
        self.inner.balance_of(holder)
    }

    fn transfer_in(&mut self, from: &Address, amount: U256) -> Result<(), SettlementError> {
        self.inner.transfer_in(from, amount)
    }

    fn transfer_out(&mut self, to: &Address, amount: U256) -> Result<(), SettlementError> {
        let handle = self.market.lock().unwrap().clone();
        if let Some(market) = handle {
            let result = market.buy(to, &common::market(), WAD, plenty());
            *self.observed.lock().unwrap() = Some(result);
        }
        self.inner.transfer_out(to, amount)
    }

    fn collect(
        &mut self,
        from: &Address,
        due: U256,
        offered: U256,
    ) -> Result<Collected, SettlementError> {
        self.inner.collect(from, due, offered)
    }
}

#[test]
fn test_reentrant_call_is_rejected() {
    let handle: Slot<SharedMarket> = Arc::new(Mutex::new(None));
    let observed: Slot<MarketResult<BuyReceipt>> = Arc::new(Mutex::new(None));
    let asset = CallbackAsset {
        inner: funded_native(U256::exp10(30)),
        market: handle.clone(),
        observed: observed.clone(),
    };
    let shared = SharedMarket::new(engine_with(Box::new(asset)));
    *handle.lock().unwrap() = Some(shared.clone());

    let outer = shared.buy(&addr("alice"), &market(), WAD, plenty());

    assert!(outer.is_ok());
    assert_eq!(
        observed.lock().unwrap().take(),
        Some(Err(MarketError::Reentrant))
    );
    assert_eq!(shared.total_supply(&market()).unwrap(), WAD);

    // The guard is released once the outer call returns
    *handle.lock().unwrap() = None;
    assert!(shared.buy(&addr("bob"), &market(), WAD, plenty()).is_ok());
    shared.with_engine(|engine| {
        assert_invariants(engine);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_threads_serialize_on_the_engine() {
    let shared = SharedMarket::new(setup());

    let workers: Vec<_> = USERS
        .iter()
        .map(|user| {
            let shared = shared.clone();
            let user = addr(user);
            thread::spawn(move || {
                for _ in 0..20 {
                    shared.buy(&user, &market(), WAD, plenty()).unwrap();
                }
                shared.sell(&user, &market(), 5 * WAD, U256::zero()).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(shared.total_supply(&market()).unwrap(), 45 * WAD);
    for user in USERS {
        assert_eq!(shared.balance_of(&market(), &addr(user)).unwrap(), 15 * WAD);
    }

    let events = shared.drain_events().unwrap();
    assert_eq!(events.len(), USERS.len() * 21);
    assert!(events.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
    shared.with_engine(|engine| {
        assert_invariants(engine);
        Ok(())
    })
    .unwrap();
}
