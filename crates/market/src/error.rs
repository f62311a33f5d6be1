//! Market errors

use curvebank_core::{Address, FeeError, MarketId, PositionId, TokenAmount, U256};
use curvebank_curve::CurveError;
use curvebank_ledger::{LedgerError, OwnershipError};
use curvebank_settlement::SettlementError;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Which position an authorization check failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
pub enum UnauthorizedSide {
    /// Single-position operations
    Position,
    /// Merge target
    Target,
    /// Merge source
    Source,
}

impl UnauthorizedSide {
    /// Stable error code: `AOE1` for the merge target, `AOE2` for the source
    pub fn code(&self) -> &'static str {
        match self {
            Self::Position => "AOE0",
            Self::Target => "AOE1",
            Self::Source => "AOE2",
        }
    }
}

/// Errors raised by market operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Unknown market: {0}")]
    UnknownMarket(MarketId),

    #[error("Unknown position: {0}")]
    UnknownPosition(PositionId),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Split amount {split} must be below the position amount {amount}")]
    InvalidSplitAmount {
        split: TokenAmount,
        amount: TokenAmount,
    },

    #[error("Insufficient balance for {holder}: available {available}, required {required}")]
    InsufficientBalance {
        holder: Address,
        available: TokenAmount,
        required: TokenAmount,
    },

    #[error("{caller} is not authorized for {side} position {id} ({})", .side.code())]
    Unauthorized {
        side: UnauthorizedSide,
        caller: Address,
        id: PositionId,
    },

    #[error("Insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment { required: U256, offered: U256 },

    #[error("Positions belong to different markets: {target_market} and {source_market}")]
    SameMarketRequired {
        target_market: MarketId,
        source_market: MarketId,
    },

    #[error("Curve range error: {0}")]
    Range(#[from] CurveError),

    #[error("Position {id} holds {amount}, cannot redeem {requested}")]
    ExceedsPosition {
        id: PositionId,
        amount: TokenAmount,
        requested: TokenAmount,
    },

    #[error("Cannot merge position {0} into itself")]
    SamePosition(PositionId),

    #[error("Insufficient reserve in {market}: available {available}, required {required}")]
    InsufficientReserve {
        market: MarketId,
        available: U256,
        required: U256,
    },

    #[error("Slippage exceeded: limit {limit}, actual {actual}")]
    SlippageExceeded { limit: U256, actual: U256 },

    #[error("Market already exists: {0}")]
    MarketExists(MarketId),

    #[error("Invalid fee configuration: {0}")]
    InvalidFeeConfig(#[from] FeeError),

    #[error("Re-entrant call rejected")]
    Reentrant,

    #[error("Settlement failed: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Receipt registry error: {0}")]
    Ownership(#[from] OwnershipError),

    #[error("Invalid address: {0}")]
    InvalidAddress(Address),

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<LedgerError> for MarketError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownMarket(id) => Self::UnknownMarket(id),
            LedgerError::MarketExists(id) => Self::MarketExists(id),
            LedgerError::UnknownPosition(id) => Self::UnknownPosition(id),
            LedgerError::InsufficientBalance {
                holder,
                available,
                required,
                ..
            } => Self::InsufficientBalance {
                holder,
                available,
                required,
            },
            LedgerError::ExceedsPosition {
                id,
                amount,
                requested,
            } => Self::ExceedsPosition {
                id,
                amount,
                requested,
            },
            LedgerError::TreasuryUnderflow {
                market,
                available,
                required,
                ..
            } => Self::InsufficientReserve {
                market,
                available,
                required,
            },
            LedgerError::ArenaFull | LedgerError::Overflow => Self::Overflow,
        }
    }
}

/// Errors raised while loading engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid fee configuration: {0}")]
    Fee(#[from] FeeError),

    #[error("Invalid curve parameters: {0}")]
    Curve(#[from] CurveError),
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_codes() {
        let err = MarketError::Unauthorized {
            side: UnauthorizedSide::Source,
            caller: Address::from("mallory"),
            id: PositionId::new(2, 0),
        };
        assert_eq!(
            err.to_string(),
            "mallory is not authorized for Source position 2v0 (AOE2)"
        );
        assert_eq!(UnauthorizedSide::Target.code(), "AOE1");
    }

    #[test]
    fn test_ledger_error_mapping() {
        let err: MarketError = LedgerError::UnknownPosition(PositionId::new(1, 4)).into();
        assert_eq!(err, MarketError::UnknownPosition(PositionId::new(1, 4)));

        let err: MarketError = LedgerError::ArenaFull.into();
        assert_eq!(err, MarketError::Overflow);

        let err: MarketError = LedgerError::TreasuryUnderflow {
            market: MarketId::from("m"),
            counter: "collateral_outstanding",
            available: U256::from(1u64),
            required: U256::from(2u64),
        }
        .into();
        assert_eq!(
            err,
            MarketError::InsufficientReserve {
                market: MarketId::from("m"),
                available: U256::from(1u64),
                required: U256::from(2u64),
            }
        );
    }
}
