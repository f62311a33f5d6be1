//! CurveBank Core - Domain types
//!
//! This crate contains the fundamental types shared by every CurveBank crate:
//! - `U256`: 256-bit unsigned integer for payment-asset values
//! - `TokenAmount`: market token amounts (18-decimal base units)
//! - `MarketId`, `Address`, `PositionId`: identifiers
//! - `FeeRate`, `FeeConfig`: exact parts-per-million fee rates
//! - `Clock`: time source used for event timestamps

pub mod clock;
pub mod fee;
pub mod id;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use fee::{FeeConfig, FeeError, FeeRate, PPM};
pub use id::{Address, MarketId, PositionId};
pub use value::{format_units, parse_units, serde_u128, serde_u256, TokenAmount, UnitsError, DECIMALS, U256, WAD};
