// 5.0: funding. each settlement adds one premium fraction to the pair's running total.
// a position pays (latest - last_seen) * size when it next touches its margin.
// past totals live in their own keyed records; the metadata only carries the latest.

use crate::math::{self, MathError};
use crate::types::TokenPair;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMetadata {
    pub pair: TokenPair,
    pub cumulative_premium_fraction: Decimal,
    // index of the latest cumulative fraction; 0 is the zero written at pool creation
    pub settlement_count: u64,
}

impl PairMetadata {
    pub fn new(pair: TokenPair) -> Self {
        Self {
            pair,
            cumulative_premium_fraction: Decimal::ZERO,
            settlement_count: 0,
        }
    }

    pub fn latest_cumulative_premium_fraction(&self) -> Decimal {
        self.cumulative_premium_fraction
    }

    pub fn push_premium_fraction(&mut self, premium_fraction: Decimal) -> Result<Decimal, MathError> {
        let next = math::add(self.cumulative_premium_fraction, premium_fraction)?;
        self.cumulative_premium_fraction = next;
        self.settlement_count += 1;
        Ok(next)
    }
}

// 5.1: (mark_twap - index) scaled from a daily rate down to one interval
pub fn calculate_premium_fraction(
    mark_twap: Decimal,
    index_price: Decimal,
    interval: chrono::Duration,
) -> Result<Decimal, MathError> {
    let premium = math::sub(mark_twap, index_price)?;
    let scaled = premium
        .checked_mul(Decimal::from(interval.num_milliseconds()))
        .ok_or(MathError::Overflow)?;
    math::quo_truncate(scaled, Decimal::from(MS_PER_DAY))
}
