//! CurveBank Curve - pure pricing function
//!
//! Price density at amount `x` is `SCALE / (CAP - x)^2`, so the cost of
//! moving the amount axis from `a` to `b` is
//!
//! ```text
//! C(a, b) = floor(SCALE / (CAP - b)) - floor(SCALE / (CAP - a))
//! ```
//!
//! The integer form telescopes exactly (`C(a,b) + C(b,c) == C(a,c)`), which
//! is what lets the ledgers price merges and splits as plain differences.
//! No state lives here.

pub mod curve;
pub mod error;

pub use curve::{Curve, CurveParams};
pub use error::CurveError;
