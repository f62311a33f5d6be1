//! Curve errors

use thiserror::Error;

/// Range errors from the pricing curve
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("Amount {at} reaches the curve capacity {cap}")]
    CapacityExceeded { at: u128, cap: u128 },

    #[error("Inverted range: from {from} is above to {to}")]
    InvertedRange { from: u128, to: u128 },

    #[error("Invalid curve parameters: {0}")]
    InvalidParams(String),

    #[error("Curve arithmetic overflow")]
    Overflow,
}
