//! Constant-product bonding curve for one synthetic pair.
//!
//! The pool holds no real liquidity. Its two reserves only price trades:
//! `base * quote = k`, and the mark price is the tangent slope
//! `quote / base`. `sqrt_depth` caches `sqrt(k)` and is re-derived by the
//! keeper after every reserve mutation.

use crate::config::{ConfigError, VpoolConfig};
use crate::math::{self, MathError};
use crate::snapshot::ReserveSnapshot;
use crate::types::{Direction, Timestamp, TokenPair, TypeError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VpoolError {
    #[error("invalid reserves: base {base}, quote {quote}")]
    InvalidReserve { base: Decimal, quote: Decimal },

    #[error("base reserve would be at or below zero")]
    BaseReserveAtZero,

    #[error("quote reserve would be at or below zero")]
    QuoteReserveAtZero,

    #[error("invalid pair: {0}")]
    Pair(#[from] TypeError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

/// Quote amount that moves the base reserve by `base_amount` in `dir`.
///
/// Adding base pays out `quote - k / (base + amount)`; removing base costs
/// `k / (base - amount) - quote`. Both reduce to
/// `quote * amount / base_after`, which is what gets evaluated so there is
/// only one truncating division.
pub fn quote_amount_by_base_amount(
    quote_reserve: Decimal,
    base_reserve: Decimal,
    dir: Direction,
    base_amount: Decimal,
) -> Result<Decimal, VpoolError> {
    if base_amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let base_after = match dir {
        Direction::AddToPool => math::add(base_reserve, base_amount)?,
        Direction::RemoveFromPool => math::sub(base_reserve, base_amount)?,
    };
    if base_after <= Decimal::ZERO {
        return Err(VpoolError::BaseReserveAtZero);
    }
    let numerator = quote_reserve
        .checked_mul(base_amount)
        .ok_or(MathError::Overflow)?;
    Ok(math::quo_truncate(numerator, base_after)?.abs())
}

/// Base amount that moves the quote reserve by `quote_amount` in `dir`.
pub fn base_amount_by_quote_amount(
    quote_reserve: Decimal,
    base_reserve: Decimal,
    dir: Direction,
    quote_amount: Decimal,
) -> Result<Decimal, VpoolError> {
    if quote_amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let quote_after = match dir {
        Direction::AddToPool => math::add(quote_reserve, quote_amount)?,
        Direction::RemoveFromPool => math::sub(quote_reserve, quote_amount)?,
    };
    if quote_after <= Decimal::ZERO {
        return Err(VpoolError::QuoteReserveAtZero);
    }
    let numerator = base_reserve
        .checked_mul(quote_amount)
        .ok_or(MathError::Overflow)?;
    Ok(math::quo_truncate(numerator, quote_after)?.abs())
}

// 3.5: one pool's reserves and risk config. sqrt_depth is derived, never set directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpool {
    pub pair: TokenPair,
    pub base_asset_reserve: Decimal,
    pub quote_asset_reserve: Decimal,
    pub sqrt_depth: Decimal,
    pub config: VpoolConfig,
}

impl Vpool {
    /// Builds a pool and derives `sqrt_depth`.
    ///
    /// # Panics
    /// If `base * quote` is negative or overflows. Callers validate reserves
    /// first and go through [`Vpool::try_new`] when the depth is untrusted.
    pub fn new(
        pair: TokenPair,
        quote_reserve: Decimal,
        base_reserve: Decimal,
        config: VpoolConfig,
    ) -> Self {
        let label = pair.to_string();
        match Self::try_new(pair, quote_reserve, base_reserve, config) {
            Ok(pool) => pool,
            Err(err) => panic!("vpool {label} has no valid depth: {err}"),
        }
    }

    /// Same as [`Vpool::new`], but an overflowing or negative depth is an error.
    pub fn try_new(
        pair: TokenPair,
        quote_reserve: Decimal,
        base_reserve: Decimal,
        config: VpoolConfig,
    ) -> Result<Self, VpoolError> {
        let product = quote_reserve
            .checked_mul(base_reserve)
            .ok_or(MathError::Overflow)?;
        let sqrt_depth = math::sqrt(product)?;
        Ok(Self {
            pair,
            base_asset_reserve: base_reserve,
            quote_asset_reserve: quote_reserve,
            sqrt_depth,
            config,
        })
    }

    /// quote / base, or zero when either side is empty
    pub fn mark_price(&self) -> Decimal {
        if self.base_asset_reserve.is_zero() || self.quote_asset_reserve.is_zero() {
            return Decimal::ZERO;
        }
        math::quo_truncate(self.quote_asset_reserve, self.base_asset_reserve)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn spot_price(&self) -> Result<Decimal, VpoolError> {
        Ok(math::quo_truncate(
            self.quote_asset_reserve,
            self.base_asset_reserve,
        )?)
    }

    pub fn quote_amount_by_base_amount(
        &self,
        dir: Direction,
        base_amount: Decimal,
    ) -> Result<Decimal, VpoolError> {
        quote_amount_by_base_amount(
            self.quote_asset_reserve,
            self.base_asset_reserve,
            dir,
            base_amount,
        )
    }

    pub fn base_amount_by_quote_amount(
        &self,
        dir: Direction,
        quote_amount: Decimal,
    ) -> Result<Decimal, VpoolError> {
        base_amount_by_quote_amount(
            self.quote_asset_reserve,
            self.base_asset_reserve,
            dir,
            quote_amount,
        )
    }

    pub fn has_enough_quote_reserve(&self, quote_amount: Decimal) -> bool {
        match self
            .quote_asset_reserve
            .checked_mul(self.config.trade_limit_ratio)
        {
            Some(limit) => quote_amount <= limit,
            None => true,
        }
    }

    pub fn has_enough_base_reserve(&self, base_amount: Decimal) -> bool {
        match self
            .base_asset_reserve
            .checked_mul(self.config.trade_limit_ratio)
        {
            Some(limit) => base_amount <= limit,
            None => true,
        }
    }

    /// True when the mark price sits strictly outside the band
    /// `[snap * (1 - r), snap * (1 + r)]`. A zero ratio disables the check.
    pub fn is_over_fluctuation_limit(&self, snapshot: &ReserveSnapshot) -> bool {
        let ratio = self.config.fluctuation_limit_ratio;
        if ratio.is_zero() {
            return false;
        }
        let mark = self.mark_price();
        mark > snapshot.upper_fluctuation_limit(ratio)
            || mark < snapshot.lower_fluctuation_limit(ratio)
    }

    /// |mark - index| / index >= max_oracle_spread_ratio
    pub fn is_over_spread_limit(&self, index_price: Decimal) -> Result<bool, VpoolError> {
        let spread = math::quo_truncate(self.mark_price() - index_price, index_price)?;
        Ok(spread.abs() >= self.config.max_oracle_spread_ratio)
    }

    pub fn add_to_quote_asset_reserve(&mut self, delta: Decimal) {
        self.quote_asset_reserve += delta;
    }

    pub fn add_to_base_asset_reserve(&mut self, delta: Decimal) {
        self.base_asset_reserve += delta;
    }

    pub fn refresh_sqrt_depth(&mut self) -> Result<(), VpoolError> {
        let product = self
            .quote_asset_reserve
            .checked_mul(self.base_asset_reserve)
            .ok_or(MathError::Overflow)?;
        self.sqrt_depth = math::sqrt(product)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), VpoolError> {
        self.pair.validate()?;
        if self.base_asset_reserve <= Decimal::ZERO || self.quote_asset_reserve <= Decimal::ZERO
        {
            return Err(VpoolError::InvalidReserve {
                base: self.base_asset_reserve,
                quote: self.quote_asset_reserve,
            });
        }
        self.config.validate()?;
        Ok(())
    }

    pub fn to_snapshot(&self, timestamp: Timestamp, block_number: i64) -> ReserveSnapshot {
        ReserveSnapshot {
            pair: self.pair.clone(),
            quote_asset_reserve: self.quote_asset_reserve,
            base_asset_reserve: self.base_asset_reserve,
            timestamp_ms: timestamp.as_millis(),
            block_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> TokenPair {
        TokenPair::new("ubtc", "unusd").unwrap()
    }

    fn pool(quote: Decimal, base: Decimal) -> Vpool {
        Vpool::new(
            pair(),
            quote,
            base,
            VpoolConfig {
                trade_limit_ratio: dec!(0.9),
                fluctuation_limit_ratio: dec!(0.1),
                max_oracle_spread_ratio: dec!(0.1),
                maintenance_margin_ratio: dec!(0.0625),
                max_leverage: dec!(15),
            },
        )
    }

    #[test]
    fn new_pool_derives_depth() {
        let p = pool(dec!(225), dec!(100));
        assert_eq!(p.sqrt_depth, math::sqrt(dec!(22500)).unwrap());
        assert!((p.sqrt_depth - dec!(150)).abs() <= dec!(0.000000000000000001));
    }

    #[test]
    #[should_panic(expected = "square root of negative value")]
    fn negative_depth_panics() {
        let _ = Vpool::new(pair(), dec!(-10), dec!(10), VpoolConfig::default());
    }

    #[test]
    fn try_new_reports_overflowing_depth() {
        let huge = dec!(1_000_000_000_000_000);
        assert_eq!(
            Vpool::try_new(pair(), huge, huge, VpoolConfig::default()),
            Err(VpoolError::Math(MathError::Overflow))
        );
        let pool = Vpool::try_new(pair(), dec!(100), dec!(400), VpoolConfig::default()).unwrap();
        assert!((pool.sqrt_depth - dec!(200)).abs() <= dec!(0.000000000000000001));
    }

    #[test]
    fn has_enough_quote_reserve_boundary() {
        let p = pool(dec!(10_000_000), dec!(10_000_000));
        assert!(p.has_enough_quote_reserve(dec!(8_000_000)));
        assert!(p.has_enough_quote_reserve(dec!(9_000_000)));
        assert!(!p.has_enough_quote_reserve(dec!(9_000_001)));
    }

    #[test]
    fn base_amount_by_quote_amount_cases() {
        let p = pool(dec!(1000), dec!(1000));
        let add = Direction::AddToPool;
        let remove = Direction::RemoveFromPool;

        assert_eq!(p.base_amount_by_quote_amount(add, Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(
            p.base_amount_by_quote_amount(add, dec!(500)).unwrap(),
            dec!(333.333333333333333333)
        );
        assert_eq!(p.base_amount_by_quote_amount(remove, dec!(500)).unwrap(), dec!(1000));
        assert_eq!(
            p.base_amount_by_quote_amount(remove, dec!(1000)),
            Err(VpoolError::QuoteReserveAtZero)
        );
        assert_eq!(
            p.base_amount_by_quote_amount(remove, dec!(9999)),
            Err(VpoolError::QuoteReserveAtZero)
        );
        assert_eq!(
            p.base_amount_by_quote_amount(add, dec!(999_555_999)).unwrap(),
            dec!(999.998999556802663136)
        );
    }

    #[test]
    fn quote_amount_by_base_amount_cases() {
        let p = pool(dec!(1000), dec!(1000));

        assert_eq!(
            p.quote_amount_by_base_amount(Direction::AddToPool, Decimal::ZERO).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            p.quote_amount_by_base_amount(Direction::AddToPool, dec!(500)).unwrap(),
            dec!(333.333333333333333333)
        );
        assert_eq!(
            p.quote_amount_by_base_amount(Direction::RemoveFromPool, dec!(500)).unwrap(),
            dec!(1000)
        );
        assert_eq!(
            p.quote_amount_by_base_amount(Direction::RemoveFromPool, dec!(1000)),
            Err(VpoolError::BaseReserveAtZero)
        );
    }

    #[test]
    fn reserve_deltas() {
        let mut p = pool(dec!(1_000_000), dec!(1_000_000));

        p.add_to_quote_asset_reserve(dec!(-100));
        assert_eq!(p.quote_asset_reserve, dec!(999_900));
        p.add_to_quote_asset_reserve(dec!(100));
        assert_eq!(p.quote_asset_reserve, dec!(1_000_000));

        p.add_to_base_asset_reserve(dec!(-100));
        assert_eq!(p.base_asset_reserve, dec!(999_900));
        p.add_to_base_asset_reserve(dec!(100));
        assert_eq!(p.base_asset_reserve, dec!(1_000_000));
    }

    #[test]
    fn mark_price_handles_empty_reserves() {
        assert_eq!(pool(dec!(10000), dec!(10)).mark_price(), dec!(1000));
        assert_eq!(pool(dec!(10000), Decimal::ZERO).mark_price(), Decimal::ZERO);
        assert_eq!(pool(Decimal::ZERO, dec!(10)).mark_price(), Decimal::ZERO);
    }

    #[test]
    fn fluctuation_limit_is_strict() {
        let snapshot = ReserveSnapshot {
            pair: pair(),
            quote_asset_reserve: dec!(1000),
            base_asset_reserve: dec!(1),
            timestamp_ms: 0,
            block_number: 0,
        };
        let with_ratio = |quote: Decimal, ratio: Decimal| {
            let mut p = pool(quote, dec!(1));
            p.config.fluctuation_limit_ratio = ratio;
            p.is_over_fluctuation_limit(&snapshot)
        };

        // zero ratio disables the check
        assert!(!with_ratio(dec!(1), Decimal::ZERO));
        assert!(!with_ratio(dec!(999), Decimal::ZERO));
        // exactly on either bound is not over
        assert!(!with_ratio(dec!(1001), dec!(0.001)));
        assert!(!with_ratio(dec!(999), dec!(0.001)));
        assert!(with_ratio(dec!(998), dec!(0.001)));
        assert!(with_ratio(dec!(1002), dec!(0.001)));
    }

    #[test]
    fn spread_limit_against_index() {
        let p = pool(dec!(1100), dec!(1000)); // mark 1.1
        assert!(p.is_over_spread_limit(dec!(1)).unwrap());
        assert!(!p.is_over_spread_limit(dec!(1.05)).unwrap());
    }

    #[test]
    fn validate_rejects_bad_pools() {
        let ok = pool(dec!(1_000_000), dec!(1_000_000));
        assert!(ok.validate().is_ok());

        let mut zero_quote = ok.clone();
        zero_quote.quote_asset_reserve = Decimal::ZERO;
        assert!(matches!(zero_quote.validate(), Err(VpoolError::InvalidReserve { .. })));

        let mut zero_base = ok.clone();
        zero_base.base_asset_reserve = Decimal::ZERO;
        assert!(matches!(zero_base.validate(), Err(VpoolError::InvalidReserve { .. })));

        let mut bad_config = ok;
        bad_config.config.max_leverage = dec!(20);
        bad_config.config.maintenance_margin_ratio = dec!(0.10);
        assert!(matches!(bad_config.validate(), Err(VpoolError::Config(_))));
    }

    #[test]
    fn snapshot_copies_reserves() {
        let p = pool(dec!(10_000), dec!(10));
        let snap = p.to_snapshot(Timestamp::from_millis(42), 7);
        assert_eq!(snap.pair, p.pair);
        assert_eq!(snap.quote_asset_reserve, dec!(10_000));
        assert_eq!(snap.base_asset_reserve, dec!(10));
        assert_eq!(snap.timestamp_ms, 42);
        assert_eq!(snap.block_number, 7);
    }
}
