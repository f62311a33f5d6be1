//! CurveBank Market - the bonding-curve market engine
//!
//! `MarketEngine` prices every operation on the curve, applies it to the
//! ledger inside a transaction and settles value through a payment asset:
//! - buy / sell against a market's circulating supply
//! - mortgage / mortgage_add / redeem on collateral positions
//! - merge / split of positions
//! - multiply / multiply_add: buy straight into collateral
//!
//! `SharedMarket` wraps the engine for use across threads.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod outcome;
pub mod quote;
pub mod shared;

pub use config::EngineConfig;
pub use engine::MarketEngine;
pub use error::{ConfigError, MarketError, MarketResult, UnauthorizedSide};
pub use events::{EventKind, EventLog, MarketEvent};
pub use guard::{GuardState, ReentrancyGuard};
pub use outcome::{
    BuyReceipt, MarketSnapshot, MarketSpec, MergeReceipt, MortgageReceipt, MultiplyReceipt,
    PositionView, RedeemReceipt, SellReceipt, SplitReceipt,
};
pub use quote::{BuyQuote, MergeQuote, MortgageQuote, MultiplyQuote, RedeemQuote, SellQuote, SplitQuote};
pub use shared::SharedMarket;
