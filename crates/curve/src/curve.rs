//! Curve implementation

use curvebank_core::{serde_u256, TokenAmount, U256, WAD};
use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// Curve shape parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    /// Hard ceiling on the amount axis (exclusive)
    pub cap: TokenAmount,
    /// Numerator of the level function
    #[serde(with = "serde_u256")]
    pub scale: U256,
}

impl CurveParams {
    /// 1,000,000 whole tokens at 18 decimals
    pub const STANDARD_CAP: TokenAmount = 1_000_000_000_000_000_000_000_000;

    /// CAP = 10^24, SCALE = 10^45
    pub fn standard() -> Self {
        Self {
            cap: Self::STANDARD_CAP,
            scale: U256::exp10(45),
        }
    }
}

impl Default for CurveParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// The bonding curve.
///
/// # Example
/// ```
/// use curvebank_curve::Curve;
/// use curvebank_core::{U256, WAD};
///
/// let curve = Curve::standard();
/// let cost = curve.cost(0, WAD).unwrap();
/// assert_eq!(cost, U256::from(1_000_001_000_001_000u64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curve {
    params: CurveParams,
}

impl Curve {
    /// Create a curve, rejecting degenerate parameters
    pub fn new(params: CurveParams) -> Result<Self, CurveError> {
        if params.cap == 0 {
            return Err(CurveError::InvalidParams("cap must be positive".into()));
        }
        if params.scale.is_zero() {
            return Err(CurveError::InvalidParams("scale must be positive".into()));
        }
        // C(0, x) is superadditive under floor division only when SCALE / CAP is exact
        if !(params.scale % U256::from(params.cap)).is_zero() {
            return Err(CurveError::InvalidParams(format!(
                "scale {} is not a multiple of cap {}",
                params.scale, params.cap
            )));
        }
        Ok(Self { params })
    }

    /// Curve with the standard parameters
    pub fn standard() -> Self {
        Self {
            params: CurveParams::standard(),
        }
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn cap(&self) -> TokenAmount {
        self.params.cap
    }

    /// `floor(SCALE / (CAP - x))`, non-decreasing in `x`
    fn level(&self, x: TokenAmount) -> Result<U256, CurveError> {
        if x >= self.params.cap {
            return Err(CurveError::CapacityExceeded {
                at: x,
                cap: self.params.cap,
            });
        }
        Ok(self.params.scale / U256::from(self.params.cap - x))
    }

    /// Cost of moving the amount axis from `from` to `to`.
    ///
    /// Requires `from <= to < CAP`.
    pub fn cost(&self, from: TokenAmount, to: TokenAmount) -> Result<U256, CurveError> {
        if from > to {
            return Err(CurveError::InvertedRange { from, to });
        }
        let upper = self.level(to)?;
        let lower = self.level(from)?;
        Ok(upper - lower)
    }

    /// Cost of moving `amount` up from `start`, with the end checked for overflow
    pub fn cost_from(&self, start: TokenAmount, amount: TokenAmount) -> Result<U256, CurveError> {
        let end = start
            .checked_add(amount)
            .ok_or_else(|| self.beyond_cap())?;
        self.cost(start, end)
    }

    /// Value of an independent curve instance holding `amount`: `C(0, amount)`
    pub fn basis(&self, amount: TokenAmount) -> Result<U256, CurveError> {
        self.cost(0, amount)
    }

    /// `C(0, a+b) - C(0, a) - C(0, b)`: value released by joining two instances
    pub fn merge_delta(&self, a: TokenAmount, b: TokenAmount) -> Result<U256, CurveError> {
        let total = a.checked_add(b).ok_or_else(|| self.beyond_cap())?;
        let joined = self.basis(total)?;
        let parts = self.basis(a)? + self.basis(b)?;
        joined.checked_sub(parts).ok_or(CurveError::Overflow)
    }

    /// `C(0, total) - C(0, total-part) - C(0, part)`: value consumed by splitting
    pub fn split_delta(&self, total: TokenAmount, part: TokenAmount) -> Result<U256, CurveError> {
        let rest = total
            .checked_sub(part)
            .ok_or(CurveError::InvertedRange { from: part, to: total })?;
        self.merge_delta(rest, part)
    }

    /// Marginal price of one whole token at amount `x`: `SCALE * 10^18 / (CAP - x)^2`
    pub fn spot_price(&self, x: TokenAmount) -> Result<U256, CurveError> {
        if x >= self.params.cap {
            return Err(CurveError::CapacityExceeded {
                at: x,
                cap: self.params.cap,
            });
        }
        let distance = U256::from(self.params.cap - x);
        let denominator = distance.checked_mul(distance).ok_or(CurveError::Overflow)?;
        let numerator = self
            .params
            .scale
            .checked_mul(U256::from(WAD))
            .ok_or(CurveError::Overflow)?;
        Ok(numerator / denominator)
    }

    fn beyond_cap(&self) -> CurveError {
        CurveError::CapacityExceeded {
            at: TokenAmount::MAX,
            cap: self.params.cap,
        }
    }

    /// Largest amount that can still be added on top of `supply`
    pub fn max_mintable(&self, supply: TokenAmount) -> TokenAmount {
        self.params.cap.saturating_sub(1).saturating_sub(supply)
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CAP: u128 = CurveParams::STANDARD_CAP;

    #[test]
    fn test_cost_one_token_from_empty() {
        let curve = Curve::standard();
        assert_eq!(
            curve.cost(0, WAD).unwrap(),
            U256::from(1_000_001_000_001_000u64)
        );
    }

    #[test]
    fn test_cost_large_entry() {
        // 83333.333 tokens from an empty curve
        let curve = Curve::standard();
        let amount = 83_333_333_000_000_000_000_000u128;
        assert_eq!(
            curve.basis(amount).unwrap(),
            U256::from_dec_str("90909090512396694359").unwrap()
        );
    }

    #[test]
    fn test_cost_empty_range_is_zero() {
        let curve = Curve::standard();
        assert!(curve.cost(5 * WAD, 5 * WAD).unwrap().is_zero());
    }

    #[test]
    fn test_additivity_random() {
        let curve = Curve::standard();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let mut points = [
                rng.gen_range(0..CAP),
                rng.gen_range(0..CAP),
                rng.gen_range(0..CAP),
            ];
            points.sort_unstable();
            let [a, b, c] = points;

            let ab = curve.cost(a, b).unwrap();
            let bc = curve.cost(b, c).unwrap();
            assert_eq!(ab + bc, curve.cost(a, c).unwrap(), "a={a} b={b} c={c}");
        }
    }

    #[test]
    fn test_monotonic_and_convex() {
        let curve = Curve::standard();
        let step = 10_000 * WAD;
        let mut previous = U256::zero();

        for i in 0..90u128 {
            let start = i * step;
            let segment = curve.cost(start, start + step).unwrap();
            assert!(segment > previous, "segment {i} not increasing");
            previous = segment;
        }
    }

    #[test]
    fn test_boundary() {
        let curve = Curve::standard();
        assert!(curve.cost(0, CAP - 1).is_ok());
        assert_eq!(
            curve.cost(0, CAP),
            Err(CurveError::CapacityExceeded { at: CAP, cap: CAP })
        );
        assert!(matches!(
            curve.cost_from(1, u128::MAX),
            Err(CurveError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_inverted_range() {
        let curve = Curve::standard();
        assert_eq!(
            curve.cost(2, 1),
            Err(CurveError::InvertedRange { from: 2, to: 1 })
        );
    }

    #[test]
    fn test_merge_and_split_deltas_agree() {
        let curve = Curve::standard();
        let a = 1_000 * WAD;
        let b = 250 * WAD;

        let merge = curve.merge_delta(a, b).unwrap();
        assert!(!merge.is_zero());
        assert_eq!(curve.split_delta(a + b, b).unwrap(), merge);
        assert_eq!(
            curve.basis(a + b).unwrap(),
            curve.basis(a).unwrap() + curve.basis(b).unwrap() + merge
        );
    }

    #[test]
    fn test_merge_delta_tiny_amounts_never_negative() {
        let curve = Curve::standard();
        for a in 0..20u128 {
            for b in 0..20u128 {
                let joined = curve.basis(a + b).unwrap();
                let parts = curve.basis(a).unwrap() + curve.basis(b).unwrap();
                assert!(joined >= parts);
                assert_eq!(curve.merge_delta(a, b).unwrap(), joined - parts);
            }
        }
    }

    #[test]
    fn test_spot_price() {
        let curve = Curve::standard();
        // 10^63 / 10^48 at an empty curve
        assert_eq!(curve.spot_price(0).unwrap(), U256::exp10(15));
        assert!(curve.spot_price(CAP / 2).unwrap() > curve.spot_price(0).unwrap());
        assert!(curve.spot_price(CAP).is_err());
    }

    #[test]
    fn test_max_mintable() {
        let curve = Curve::standard();
        assert_eq!(curve.max_mintable(0), CAP - 1);
        assert_eq!(curve.max_mintable(CAP), 0);
    }

    #[test]
    fn test_invalid_params() {
        let params = CurveParams {
            cap: 0,
            scale: U256::one(),
        };
        assert!(matches!(
            Curve::new(params),
            Err(CurveError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_scale_must_be_a_multiple_of_cap() {
        let inexact = CurveParams {
            cap: 1_000,
            scale: U256::from(1_600u64),
        };
        assert!(matches!(
            Curve::new(inexact),
            Err(CurveError::InvalidParams(_))
        ));

        let exact = CurveParams {
            cap: 1_000,
            scale: U256::from(2_000u64),
        };
        let curve = Curve::new(exact).unwrap();
        for a in 0..500u128 {
            for b in (0..500u128).step_by(7) {
                let joined = curve.basis(a + b).unwrap();
                let parts = curve.basis(a).unwrap() + curve.basis(b).unwrap();
                assert_eq!(curve.merge_delta(a, b).unwrap(), joined - parts, "a={a} b={b}");
            }
        }
        assert_eq!(curve.split_delta(400, 200).unwrap(), U256::one());
    }

    #[test]
    fn test_params_serde() {
        let json = serde_json::to_string(&CurveParams::standard()).unwrap();
        assert!(json.contains(r#""scale":"1000000000000000000000000000000000000000000000""#));
        let parsed: CurveParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CurveParams::standard());
    }
}
