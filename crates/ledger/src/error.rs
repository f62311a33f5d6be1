//! Ledger errors

use curvebank_core::{Address, MarketId, PositionId, TokenAmount, U256};
use thiserror::Error;

/// Errors raised by ledger mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown market: {0}")]
    UnknownMarket(MarketId),

    #[error("Market already exists: {0}")]
    MarketExists(MarketId),

    #[error("Unknown position: {0}")]
    UnknownPosition(PositionId),

    #[error("Insufficient balance for {holder} in {market}: available {available}, required {required}")]
    InsufficientBalance {
        market: MarketId,
        holder: Address,
        available: TokenAmount,
        required: TokenAmount,
    },

    #[error("Position {id} holds {amount}, cannot remove {requested}")]
    ExceedsPosition {
        id: PositionId,
        amount: TokenAmount,
        requested: TokenAmount,
    },

    #[error("Treasury counter underflow in {market}: {counter} holds {available}, cannot remove {required}")]
    TreasuryUnderflow {
        market: MarketId,
        counter: &'static str,
        available: U256,
        required: U256,
    },

    #[error("Position arena is full")]
    ArenaFull,

    #[error("Ledger arithmetic overflow")]
    Overflow,
}

/// Errors raised by the receipt registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("No receipt for position {0}")]
    UnknownReceipt(PositionId),

    #[error("Receipt for position {0} already minted")]
    AlreadyMinted(PositionId),

    #[error("{caller} may not move receipt {id}")]
    NotAuthorized { caller: Address, id: PositionId },

    #[error("Receipts cannot be sent to {0}")]
    InvalidRecipient(Address),
}
