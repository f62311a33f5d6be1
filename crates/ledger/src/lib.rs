//! CurveBank Ledger - the state a market engine prices against
//!
//! - `MarketRecord`: per-market supply, balances and treasury counters
//! - `PositionArena`: collateral positions behind generational ids
//! - `ReceiptRegistry`: who holds the receipt of each position
//! - `LedgerState` / `Transaction`: all-or-nothing mutation with an undo log

pub mod error;
pub mod position;
pub mod receipt;
pub mod supply;
pub mod txn;

pub use error::{LedgerError, OwnershipError};
pub use position::{Position, PositionArena};
pub use receipt::{OwnershipRegistry, ReceiptRegistry};
pub use supply::MarketRecord;
pub use txn::{LedgerState, Transaction};
