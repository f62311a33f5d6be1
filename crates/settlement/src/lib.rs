//! CurveBank Settlement - value movement at the engine boundary
//!
//! The engine never touches a concrete payment asset. It computes fees with
//! the fee splitter, describes the value movements of an operation as a
//! `SettlementPlan`, and hands the plan to a `PaymentAsset` trait object
//! chosen once when the engine is built.

pub mod asset;
mod book;
pub mod error;
pub mod fees;
pub mod native;
pub mod plan;
pub mod token;

pub use asset::{AssetKind, Collected, PaymentAsset};
pub use error::SettlementError;
pub use fees::{mortgage_fee, trade_fees, TradeFees};
pub use native::NativeCurrency;
pub use plan::{Collection, Payout, PayoutKind, SettlementPlan, SettlementReport};
pub use token::FungibleToken;
