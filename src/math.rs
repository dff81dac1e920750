//! Fixed-point helpers over `rust_decimal`.
//!
//! Every value handed back to a caller carries at most [`PRECISION`]
//! fractional digits and is truncated toward zero. `rust_decimal` keeps 28
//! significant digits internally and rounds the last one, so division goes
//! through [`quo_truncate`], which corrects a rounded-up quotient before
//! cutting it down.

use rust_decimal::prelude::*;
use rust_decimal::MathematicalOps;

pub const PRECISION: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("decimal overflow")]
    Overflow,

    #[error("square root of negative value {0}")]
    NegativeSqrt(Decimal),
}

pub fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRECISION, RoundingStrategy::ToZero)
}

// 1.7: numerator / denominator cut to PRECISION digits, never rounded up
pub fn quo_truncate(numerator: Decimal, denominator: Decimal) -> Result<Decimal, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let quotient = numerator
        .checked_div(denominator)
        .ok_or(MathError::Overflow)?;
    let mut truncated = truncate(quotient);

    // the 28th digit may have been rounded up across the truncation point
    if !truncated.is_zero() {
        if let Some(back) = truncated.checked_mul(denominator) {
            if back.abs() > numerator.abs() {
                let ulp = Decimal::new(1, PRECISION);
                truncated -= ulp * truncated.signum();
            }
        }
    }
    Ok(truncated)
}

pub fn mul_truncate(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_mul(b).map(truncate).ok_or(MathError::Overflow)
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

pub fn sqrt(value: Decimal) -> Result<Decimal, MathError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MathError::NegativeSqrt(value));
    }
    value
        .sqrt()
        .map(truncate)
        .ok_or(MathError::NegativeSqrt(value))
}
