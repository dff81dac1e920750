// 2.3 amm/prices.rs: spot and swap quotes against live reserves, and the TWAP fold
// over the snapshot history.

use super::keeper::VpoolKeeper;
use super::results::AmmError;
use crate::context::Context;
use crate::math::{self, MathError};
use crate::store::KvStore;
use crate::types::{Direction, TokenPair, TwapCalcOption};
use rust_decimal::Decimal;

impl VpoolKeeper {
    /// Quote needed to buy one base at the tangent of the curve.
    pub fn get_spot_price<S: KvStore>(&self, ctx: &Context<S>, pair: &TokenPair) -> Result<Decimal, AmmError> {
        let pool = self.get_pool(ctx, pair)?;
        Ok(pool.spot_price()?)
    }

    /// Quote amount that moves `base_amount` of base in `dir`.
    pub fn get_base_asset_price<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        dir: Direction,
        base_amount: Decimal,
    ) -> Result<Decimal, AmmError> {
        let pool = self.get_pool(ctx, pair)?;
        Ok(pool.quote_amount_by_base_amount(dir, base_amount)?)
    }

    /// Base amount that moves `quote_amount` of quote in `dir`.
    pub fn get_quote_asset_price<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        dir: Direction,
        quote_amount: Decimal,
    ) -> Result<Decimal, AmmError> {
        let pool = self.get_pool(ctx, pair)?;
        Ok(pool.base_amount_by_quote_amount(dir, quote_amount)?)
    }

    pub fn has_enough_quote_reserve<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        quote_amount: Decimal,
    ) -> Result<bool, AmmError> {
        Ok(self.get_pool(ctx, pair)?.has_enough_quote_reserve(quote_amount))
    }

    pub fn has_enough_base_reserve<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        base_amount: Decimal,
    ) -> Result<bool, AmmError> {
        Ok(self.get_pool(ctx, pair)?.has_enough_base_reserve(base_amount))
    }

    pub fn get_spot_twap<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        lookback: chrono::Duration,
    ) -> Result<Decimal, AmmError> {
        self.calc_twap(ctx, pair, TwapCalcOption::Spot, Direction::AddToPool, Decimal::ZERO, lookback)
    }

    /// Time-weighted quote amount for moving `base_amount` of base.
    pub fn get_base_asset_twap<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        dir: Direction,
        base_amount: Decimal,
        lookback: chrono::Duration,
    ) -> Result<Decimal, AmmError> {
        self.calc_twap(ctx, pair, TwapCalcOption::BaseAssetSwap, dir, base_amount, lookback)
    }

    /// Time-weighted base amount for moving `quote_amount` of quote.
    pub fn get_quote_asset_twap<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        dir: Direction,
        quote_amount: Decimal,
        lookback: chrono::Duration,
    ) -> Result<Decimal, AmmError> {
        self.calc_twap(ctx, pair, TwapCalcOption::QuoteAssetSwap, dir, quote_amount, lookback)
    }

    /// Time-weighted average over `[block_time - lookback, block_time)`.
    ///
    /// Walks the history from the latest snapshot backwards. Each snapshot's
    /// price holds from its own timestamp (clamped to the window start) until
    /// the next snapshot, or the block time for the latest one. The walk ends
    /// at the first snapshot at or before the window start, or at counter 0
    /// when the history is shorter than the window.
    pub fn calc_twap<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        option: TwapCalcOption,
        dir: Direction,
        amount: Decimal,
        lookback: chrono::Duration,
    ) -> Result<Decimal, AmmError> {
        let lower_ms = ctx.block_time().saturating_sub(lookback).as_millis();
        let latest = self
            .get_snapshot_counter(ctx, pair)?
            .ok_or_else(|| AmmError::SnapshotCounterNotFound(pair.clone()))?;

        let mut cumulative_price = Decimal::ZERO;
        let mut cumulative_ms: i64 = 0;
        let mut prev_ms = ctx.block_time().as_millis();
        let mut latest_price: Option<Decimal> = None;

        // signed so that stepping below counter 0 ends the loop instead of wrapping
        let mut counter = latest as i64;
        while counter >= 0 {
            let snapshot = self.get_snapshot(ctx, pair, counter as u64)?;
            let price = snapshot.price_for(option, dir, amount)?;
            latest_price.get_or_insert(price);

            let below_window = snapshot.timestamp_ms <= lower_ms;
            let elapsed_ms = if below_window {
                prev_ms - lower_ms
            } else {
                prev_ms - snapshot.timestamp_ms
            };

            let weighted = price
                .checked_mul(Decimal::from(elapsed_ms))
                .ok_or(MathError::Overflow)?;
            cumulative_price = math::add(cumulative_price, weighted)?;
            cumulative_ms += elapsed_ms;

            if below_window {
                break;
            }
            prev_ms = snapshot.timestamp_ms;
            counter -= 1;
        }

        // every visited snapshot sits at the block time: nothing to weight
        if cumulative_ms == 0 {
            return Ok(latest_price.unwrap_or(Decimal::ZERO));
        }
        Ok(math::quo_truncate(cumulative_price, Decimal::from(cumulative_ms))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::types::Timestamp;
    use rust_decimal_macros::dec;

    fn pair() -> TokenPair {
        TokenPair::new("ubtc", "unusd").unwrap()
    }

    // (quote, base, timestamp_ms) in counter order
    fn history(snapshots: &[(Decimal, Decimal, i64)], now_ms: i64) -> Context<MemStore> {
        let keeper = VpoolKeeper::new();
        let mut ctx = Context::new(MemStore::new());
        for (i, (quote, base, ts)) in snapshots.iter().enumerate() {
            keeper
                .save_snapshot(&mut ctx, &pair(), i as u64, *quote, *base, Timestamp::from_millis(*ts), i as i64)
                .unwrap();
        }
        keeper
            .save_snapshot_counter(&mut ctx, &pair(), snapshots.len() as u64 - 1)
            .unwrap();
        ctx.set_block(snapshots.len() as i64, Timestamp::from_millis(now_ms));
        ctx
    }

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn spot_price_of_pool() {
        let keeper = VpoolKeeper::new();
        let mut ctx = Context::new(MemStore::new());
        keeper
            .create_pool(&mut ctx, pair(), dec!(0.9), dec!(40_000), dec!(1), dec!(0.1), None)
            .unwrap();
        assert_eq!(keeper.get_spot_price(&ctx, &pair()).unwrap(), dec!(40_000));
    }

    #[test]
    fn spot_price_truncates() {
        let keeper = VpoolKeeper::new();
        let mut ctx = Context::new(MemStore::new());
        keeper
            .create_pool(&mut ctx, pair(), dec!(0.9), dec!(2489723947), dec!(34597234), dec!(0.1), None)
            .unwrap();
        assert_eq!(
            keeper.get_spot_price(&ctx, &pair()).unwrap(),
            dec!(71.963092396345904415)
        );
    }

    #[test]
    fn prices_need_a_pool() {
        let keeper = VpoolKeeper::new();
        let ctx = Context::new(MemStore::new());
        assert_eq!(
            keeper.get_spot_price(&ctx, &pair()),
            Err(AmmError::PoolNotFound(pair()))
        );
        assert_eq!(
            keeper.get_base_asset_price(&ctx, &pair(), Direction::AddToPool, dec!(1)),
            Err(AmmError::PoolNotFound(pair()))
        );
    }

    #[test]
    fn swap_quotes_against_live_reserves() {
        let keeper = VpoolKeeper::new();
        let mut ctx = Context::new(MemStore::new());
        keeper
            .create_pool(&mut ctx, pair(), dec!(0.9), dec!(1000), dec!(1000), dec!(0.1), None)
            .unwrap();

        assert_eq!(
            keeper
                .get_base_asset_price(&ctx, &pair(), Direction::AddToPool, dec!(500))
                .unwrap(),
            dec!(333.333333333333333333)
        );
        assert!(matches!(
            keeper.get_base_asset_price(&ctx, &pair(), Direction::RemoveFromPool, dec!(1000)),
            Err(AmmError::Vpool(crate::vpool::VpoolError::BaseReserveAtZero))
        ));
        assert_eq!(
            keeper
                .get_quote_asset_price(&ctx, &pair(), Direction::RemoveFromPool, dec!(500))
                .unwrap(),
            dec!(1000)
        );
        assert!(keeper.has_enough_quote_reserve(&ctx, &pair(), dec!(900)).unwrap());
        assert!(!keeper.has_enough_quote_reserve(&ctx, &pair(), dec!(900.000000000000000001)).unwrap());
        assert!(keeper.has_enough_base_reserve(&ctx, &pair(), dec!(900)).unwrap());
    }

    #[test]
    fn spot_twap_over_three_snapshots() {
        let ctx = history(
            &[(dec!(90), dec!(10), 10), (dec!(85), dec!(10), 20), (dec!(95), dec!(10), 30)],
            30,
        );
        let twap = VpoolKeeper::new().get_spot_twap(&ctx, &pair(), ms(20)).unwrap();
        assert_eq!(twap, dec!(8.75));
    }

    #[test]
    fn spot_twap_partial_window() {
        // 9.5 * 5 + 8.5 * 10 + 9 * 9 over 24ms
        let ctx = history(
            &[(dec!(90), dec!(10), 10), (dec!(85), dec!(10), 20), (dec!(95), dec!(10), 30)],
            35,
        );
        let twap = VpoolKeeper::new().get_spot_twap(&ctx, &pair(), ms(24)).unwrap();
        assert_eq!(twap, dec!(8.895833333333333333));
    }

    #[test]
    fn history_shorter_than_window() {
        // window starts at -70, history only from 10
        let ctx = history(&[(dec!(90), dec!(10), 10), (dec!(80), dec!(10), 20)], 30);
        let twap = VpoolKeeper::new().get_spot_twap(&ctx, &pair(), ms(100)).unwrap();
        // 8 * 10 + 9 * 10 over 20ms
        assert_eq!(twap, dec!(8.5));
    }

    #[test]
    fn single_snapshot_yields_its_price() {
        let ctx = history(&[(dec!(40_000), dec!(1), 0)], 1_000);
        let keeper = VpoolKeeper::new();
        for lookback in [1, 500, 1_000, 50_000] {
            assert_eq!(keeper.get_spot_twap(&ctx, &pair(), ms(lookback)).unwrap(), dec!(40_000));
        }
    }

    #[test]
    fn zero_period_falls_back_to_latest() {
        // both snapshots at the block time
        let ctx = history(&[(dec!(90), dec!(10), 30), (dec!(95), dec!(10), 30)], 30);
        let twap = VpoolKeeper::new().get_spot_twap(&ctx, &pair(), ms(0)).unwrap();
        assert_eq!(twap, dec!(9.5));
    }

    #[test]
    fn twap_without_history_fails() {
        let ctx = Context::new(MemStore::new());
        assert_eq!(
            VpoolKeeper::new().get_spot_twap(&ctx, &pair(), ms(10)),
            Err(AmmError::SnapshotCounterNotFound(pair()))
        );
    }

    #[test]
    fn quote_asset_twap_add() {
        let ctx = history(&[(dec!(30), dec!(10), 10), (dec!(40), dec!(7.5), 20)], 30);
        let twap = VpoolKeeper::new()
            .get_quote_asset_twap(&ctx, &pair(), Direction::AddToPool, dec!(10), ms(20))
            .unwrap();
        // 10 * 10 / 40 = 2.5 and 7.5 * 10 / 50 = 1.5
        assert_eq!(twap, dec!(2));
    }

    #[test]
    fn quote_asset_twap_remove() {
        let ctx = history(&[(dec!(60), dec!(10), 10), (dec!(50), dec!(12), 20)], 30);
        let twap = VpoolKeeper::new()
            .get_quote_asset_twap(&ctx, &pair(), Direction::RemoveFromPool, dec!(10), ms(20))
            .unwrap();
        // 10 * 10 / 50 = 2 and 12 * 10 / 40 = 3
        assert_eq!(twap, dec!(2.5));
    }

    #[test]
    fn base_asset_twap_add() {
        let ctx = history(&[(dec!(60), dec!(10), 10), (dec!(30), dec!(20), 20)], 30);
        let twap = VpoolKeeper::new()
            .get_base_asset_twap(&ctx, &pair(), Direction::AddToPool, dec!(10), ms(20))
            .unwrap();
        // 60 * 10 / 20 = 30 and 30 * 10 / 30 = 10
        assert_eq!(twap, dec!(20));
    }

    #[test]
    fn base_asset_twap_remove() {
        let ctx = history(&[(dec!(60), dec!(10), 10), (dec!(75), dec!(8), 20)], 30);
        let twap = VpoolKeeper::new()
            .get_base_asset_twap(&ctx, &pair(), Direction::RemoveFromPool, dec!(2), ms(20))
            .unwrap();
        // 60 * 2 / 8 = 15 and 75 * 2 / 6 = 25
        assert_eq!(twap, dec!(20));
    }
}
