//! Arbitrary-precision arithmetic for on-chain native/raw token amounts.
//!
//! Every monetary quantity in the agent — lamports, raw token balances,
//! cost bases — is carried as [`BigAmount`], a thin, non-negative wrapper
//! around [`num_bigint::BigUint`]. Nothing in this crate ever uses a
//! floating-point type: fractional sizing goes through [`BigAmount::mul_frac_ppm`],
//! which does the multiply-then-divide in arbitrary-precision integer math
//! so that fill allocation is lossless and deterministic (see
//! `ledger::apply_sell` for the one-lamport rounding bound this buys us).
//!
//! Realized PnL is signed (losses are allowed), so it is carried separately
//! as [`SignedAmount`], a wrapper around `num_bigint::BigInt`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount string {0:?}: not a non-negative integer")]
    InvalidAmount(String),
    #[error("ppm out of range: {0} (expected 0..=1_000_000)")]
    PpmOutOfRange(u64),
}

/// A non-negative arbitrary-precision integer amount in a chain's base unit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BigAmount(BigUint);

impl BigAmount {
    pub const PPM_SCALE: u64 = 1_000_000;

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_u64(v: u64) -> Self {
        Self(BigUint::from(v))
    }

    /// Parses a canonical non-negative base-10 integer string (no fractional
    /// part, no sign, no leading `+`). Leading zeros are tolerated but the
    /// canonical form produced by `to_decimal_string` never has them.
    pub fn from_decimal_string(s: &str) -> Result<Self, AmountError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidAmount(s.to_string()));
        }
        BigUint::from_str(trimmed)
            .map(Self)
            .map_err(|_| AmountError::InvalidAmount(s.to_string()))
    }

    pub fn to_decimal_string(&self) -> String {
        self.0.to_str_radix(10)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Saturating subtraction: never goes below zero.
    pub fn sub_saturating(&self, other: &Self) -> Self {
        if self.0 < other.0 {
            Self::zero()
        } else {
            Self(&self.0 - &other.0)
        }
    }

    pub fn min(&self, other: &Self) -> Self {
        if self.0 <= other.0 {
            self.clone()
        } else {
            other.clone()
        }
    }

    /// `amount * ppm / 1_000_000`, integer division rounding toward zero.
    ///
    /// Used for every proportional sell, buy sizing, and sell-fraction
    /// calculation. `ppm` must be in `[0, 1_000_000]`.
    pub fn mul_frac_ppm(&self, ppm: u64) -> Result<Self, AmountError> {
        if ppm > Self::PPM_SCALE {
            return Err(AmountError::PpmOutOfRange(ppm));
        }
        let numerator = &self.0 * BigUint::from(ppm);
        Ok(Self(numerator / BigUint::from(Self::PPM_SCALE)))
    }

    /// `self * numerator / denominator`, rounding toward zero. General form
    /// used by cost-basis allocation (`cost_lamports * sold / raw_amount`).
    pub fn mul_div(&self, numerator: &Self, denominator: &Self) -> Self {
        if denominator.is_zero() {
            return Self::zero();
        }
        Self(&self.0 * &numerator.0 / &denominator.0)
    }

    pub fn cmp_order(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Lossy conversion for threshold comparisons (`pnl_pct`, market-value
    /// checks) — never fed back into ledger arithmetic (§9, "Ambiguous
    /// numeric coercions").
    pub fn as_f64_lossy(&self) -> f64 {
        self.to_decimal_string().parse::<f64>().unwrap_or(0.0)
    }
}

impl fmt::Display for BigAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for BigAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for BigAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_decimal_string(&s).map_err(serde::de::Error::custom)
    }
}

/// A signed arbitrary-precision integer amount (used for realized PnL,
/// where losses are allowed). Never fed back into non-negative ledger
/// balances without going back through `BigAmount`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SignedAmount(BigInt);

impl SignedAmount {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn from_i64(v: i64) -> Self {
        Self(BigInt::from(v))
    }

    pub fn from_decimal_string(s: &str) -> Result<Self, AmountError> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidAmount(s.to_string()));
        }
        BigInt::from_str(trimmed)
            .map(Self)
            .map_err(|_| AmountError::InvalidAmount(s.to_string()))
    }

    pub fn to_decimal_string(&self) -> String {
        self.0.to_str_radix(10)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Adds an unsigned delta with a sign (`+1` for a gain, `-1` for a loss).
    pub fn add_signed(&self, delta: &BigAmount, positive: bool) -> Self {
        let delta_signed = BigInt::from_biguint(
            if positive {
                num_bigint::Sign::Plus
            } else {
                num_bigint::Sign::Minus
            },
            delta.0.clone(),
        );
        Self(&self.0 + delta_signed)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < BigInt::zero()
    }

    pub fn as_f64_lossy(&self) -> f64 {
        // Only used for pnl_pct-style threshold comparisons, never fed back
        // into ledger arithmetic (see bigamount/DESIGN note in the root
        // DESIGN.md). f64 has 53 bits of exact integer precision, which is
        // ample for realistic lamport PnL magnitudes.
        self.0.to_string().parse::<f64>().unwrap_or(0.0)
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for SignedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for SignedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_decimal_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_round_trips() {
        let a = BigAmount::from_decimal_string("1000000000").unwrap();
        assert_eq!(a.to_decimal_string(), "1000000000");
    }

    #[test]
    fn rejects_non_integer_decimal() {
        assert!(BigAmount::from_decimal_string("1.5").is_err());
        assert!(BigAmount::from_decimal_string("-5").is_err());
        assert!(BigAmount::from_decimal_string("abc").is_err());
        assert!(BigAmount::from_decimal_string("").is_err());
    }

    #[test]
    fn canonicalizes_leading_zeros() {
        let a = BigAmount::from_decimal_string("007").unwrap();
        assert_eq!(a.to_decimal_string(), "7");
    }

    #[test]
    fn sub_saturating_never_negative() {
        let a = BigAmount::from_u64(5);
        let b = BigAmount::from_u64(10);
        assert_eq!(a.sub_saturating(&b), BigAmount::zero());
        assert_eq!(b.sub_saturating(&a), BigAmount::from_u64(5));
    }

    #[test]
    fn mul_frac_ppm_is_lossless_for_exact_fractions() {
        let a = BigAmount::from_u64(1_000_000_000);
        // 99.5% = 995_000 ppm
        let out = a.mul_frac_ppm(995_000).unwrap();
        assert_eq!(out.to_decimal_string(), "995000000");
    }

    #[test]
    fn mul_frac_ppm_rejects_out_of_range() {
        let a = BigAmount::from_u64(100);
        assert!(a.mul_frac_ppm(1_000_001).is_err());
    }

    #[test]
    fn mul_div_matches_scenario_b_cost_allocation() {
        // cost_lamports * sold / raw_amount = 900 * 300 / 1000 = 270
        let cost = BigAmount::from_u64(900);
        let sold = BigAmount::from_u64(300);
        let raw = BigAmount::from_u64(1000);
        assert_eq!(cost.mul_div(&sold, &raw), BigAmount::from_u64(270));
    }

    #[test]
    fn signed_amount_allows_negative() {
        let s = SignedAmount::from_decimal_string("-12345").unwrap();
        assert!(s.is_negative());
        assert_eq!(s.to_decimal_string(), "-12345");
    }

    #[test]
    fn signed_amount_add_signed() {
        let mut pnl = SignedAmount::zero();
        pnl = pnl.add_signed(&BigAmount::from_u64(200_000_000), true);
        assert_eq!(pnl.to_decimal_string(), "200000000");
        pnl = pnl.add_signed(&BigAmount::from_u64(50_000_000), false);
        assert_eq!(pnl.to_decimal_string(), "150000000");
    }

    #[test]
    fn as_f64_lossy_round_trips_small_values() {
        let a = BigAmount::from_u64(1_000_000_000);
        assert_eq!(a.as_f64_lossy(), 1_000_000_000.0);
    }

    #[test]
    fn serde_round_trip() {
        let a = BigAmount::from_decimal_string("123456789012345678901234567890").unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"123456789012345678901234567890\"");
        let back: BigAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
