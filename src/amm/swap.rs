// 2.4 amm/swap.rs: reserve-mutating swaps. every check runs before the first write,
// so a rejected swap leaves the store untouched.

use super::keeper::VpoolKeeper;
use super::results::{AmmError, SwapResult};
use crate::context::Context;
use crate::events::{EventPayload, SwapEvent};
use crate::store::KvStore;
use crate::types::{Direction, TokenPair};
use crate::vpool::Vpool;
use rust_decimal::Decimal;

impl VpoolKeeper {
    /// Trades `quote_amount` of quote against the curve.
    ///
    /// AddToPool sells quote for base (a long), RemoveFromPool buys quote
    /// back with base (a short). A non-zero `base_limit` is the least base
    /// a long accepts, or the most base a short pays.
    pub fn swap_quote_for_base<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        dir: Direction,
        quote_amount: Decimal,
        base_limit: Decimal,
    ) -> Result<SwapResult, AmmError> {
        let mut pool = self.get_pool(ctx, pair)?;
        if quote_amount.is_zero() {
            return Ok(SwapResult::noop(pair, dir));
        }
        if !pool.has_enough_quote_reserve(quote_amount) {
            return Err(AmmError::OverTradingLimit {
                pair: pair.clone(),
                amount: quote_amount,
            });
        }

        let base_amount = pool.base_amount_by_quote_amount(dir, quote_amount)?;
        check_user_limit(dir, base_amount, base_limit)?;

        match dir {
            Direction::AddToPool => {
                pool.add_to_quote_asset_reserve(quote_amount);
                pool.add_to_base_asset_reserve(-base_amount);
            }
            Direction::RemoveFromPool => {
                pool.add_to_quote_asset_reserve(-quote_amount);
                pool.add_to_base_asset_reserve(base_amount);
            }
        }
        self.check_fluctuation_limit(ctx, &pool)?;
        let (_, counter) = self.commit_reserves(ctx, pool)?;

        ctx.emit_event(EventPayload::SwapQuoteForBase(SwapEvent {
            pair: pair.clone(),
            direction: dir,
            quote_amount,
            base_amount,
        }));
        log::debug!("{} swap {:?}: {} quote for {} base", pair, dir, quote_amount, base_amount);

        Ok(SwapResult {
            pair: pair.clone(),
            direction: dir,
            quote_amount,
            base_amount,
            snapshot_counter: Some(counter),
        })
    }

    /// Trades `base_amount` of base against the curve.
    ///
    /// AddToPool sells base for quote (closing a long), RemoveFromPool buys
    /// base with quote (closing a short). A non-zero `quote_limit` is the
    /// least quote received, or the most quote paid.
    pub fn swap_base_for_quote<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        dir: Direction,
        base_amount: Decimal,
        quote_limit: Decimal,
    ) -> Result<SwapResult, AmmError> {
        let mut pool = self.get_pool(ctx, pair)?;
        if base_amount.is_zero() {
            return Ok(SwapResult::noop(pair, dir));
        }
        if !pool.has_enough_base_reserve(base_amount) {
            return Err(AmmError::OverTradingLimit {
                pair: pair.clone(),
                amount: base_amount,
            });
        }

        let quote_amount = pool.quote_amount_by_base_amount(dir, base_amount)?;
        check_user_limit(dir, quote_amount, quote_limit)?;

        match dir {
            Direction::AddToPool => {
                pool.add_to_base_asset_reserve(base_amount);
                pool.add_to_quote_asset_reserve(-quote_amount);
            }
            Direction::RemoveFromPool => {
                pool.add_to_base_asset_reserve(-base_amount);
                pool.add_to_quote_asset_reserve(quote_amount);
            }
        }
        self.check_fluctuation_limit(ctx, &pool)?;
        let (_, counter) = self.commit_reserves(ctx, pool)?;

        ctx.emit_event(EventPayload::SwapBaseForQuote(SwapEvent {
            pair: pair.clone(),
            direction: dir,
            quote_amount,
            base_amount,
        }));
        log::debug!("{} swap {:?}: {} base for {} quote", pair, dir, base_amount, quote_amount);

        Ok(SwapResult {
            pair: pair.clone(),
            direction: dir,
            quote_amount,
            base_amount,
            snapshot_counter: Some(counter),
        })
    }

    /// Compares the post-trade mark price with the latest snapshot from an
    /// earlier block. Snapshots written in the current block are skipped, so
    /// every swap in a block is held to the same pre-block price. Snapshot 0
    /// is the fallback when the pool was created in this block.
    fn check_fluctuation_limit<S: KvStore>(&self, ctx: &Context<S>, pool: &Vpool) -> Result<(), AmmError> {
        if pool.config.fluctuation_limit_ratio.is_zero() {
            return Ok(());
        }
        let (mut reference, latest) = self.get_latest_snapshot(ctx, &pool.pair)?;
        // signed so that stepping below counter 0 ends the loop instead of wrapping
        let mut counter = latest as i64 - 1;
        while reference.block_number >= ctx.block_height() && counter >= 0 {
            reference = self.get_snapshot(ctx, &pool.pair, counter as u64)?;
            counter -= 1;
        }
        if pool.is_over_fluctuation_limit(&reference) {
            return Err(AmmError::OverFluctuationLimit {
                pair: pool.pair.clone(),
                mark_price: pool.mark_price(),
            });
        }
        Ok(())
    }
}

// AddToPool receives the output and wants at least the limit; RemoveFromPool pays it and wants at most
fn check_user_limit(dir: Direction, amount: Decimal, limit: Decimal) -> Result<(), AmmError> {
    if limit.is_zero() {
        return Ok(());
    }
    let fails = match dir {
        Direction::AddToPool => amount < limit,
        Direction::RemoveFromPool => amount > limit,
    };
    if fails {
        return Err(AmmError::AssetFailsUserLimit {
            amount,
            limit,
            direction: dir,
        });
    }
    Ok(())
}
