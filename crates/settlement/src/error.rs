//! Settlement errors

use curvebank_core::{Address, U256};
use thiserror::Error;

/// Errors raised while moving value through a payment asset
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Insufficient funds for {holder}: available {available}, required {required}")]
    InsufficientFunds {
        holder: Address,
        available: U256,
        required: U256,
    },

    #[error("Insufficient allowance from {owner}: allowance {allowance}, required {required}")]
    InsufficientAllowance {
        owner: Address,
        allowance: U256,
        required: U256,
    },

    #[error("Payment of {offered} does not cover {due}")]
    Underpaid { due: U256, offered: U256 },

    #[error("Transfer rejected by payment asset: {0}")]
    Rejected(String),

    #[error("Settlement arithmetic overflow")]
    Overflow,
}
