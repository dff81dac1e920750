//! Index price and position valuation.

use super::core::Engine;
use super::results::EngineError;
use crate::context::Context;
use crate::custody::CollateralBank;
use crate::math;
use crate::oracle::PriceOracle;
use crate::position::{PnlCalcOption, PnlPreferenceOption, Position, PositionValuation};
use crate::store::KvStore;
use crate::types::TokenPair;
use rust_decimal::Decimal;

impl<O: PriceOracle, B: CollateralBank> Engine<O, B> {
    /// Oracle price of one base in quote. Oracle errors propagate as-is.
    pub fn get_underlying_price(&self, pair: &TokenPair) -> Result<Decimal, EngineError> {
        Ok(self.oracle.price_for_pair(pair)?)
    }

    /// Whether the pool mark has drifted from the index by at least the pool's spread ratio.
    pub fn is_over_spread_limit<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<bool, EngineError> {
        let pool = self.require_pool(ctx, pair)?;
        let index_price = self.get_underlying_price(pair)?;
        Ok(pool.is_over_spread_limit(index_price)?)
    }

    /// Value of closing the whole position now, and its pnl against open notional.
    /// Longs close by adding base to the pool, shorts by removing it.
    pub fn position_notional_and_unrealized_pnl<S: KvStore>(
        &self,
        ctx: &Context<S>,
        position: &Position,
        option: PnlCalcOption,
    ) -> Result<PositionValuation, EngineError> {
        if position.size.is_zero() {
            return Ok(PositionValuation::zero());
        }
        let size = position.size.abs();
        let dir = position.size.close_direction();

        let position_notional = match option {
            PnlCalcOption::SpotPrice => {
                self.vpool_keeper
                    .get_base_asset_price(ctx, &position.pair, dir, size)?
            }
            PnlCalcOption::Twap => self.vpool_keeper.get_base_asset_twap(
                ctx,
                &position.pair,
                dir,
                size,
                self.config.params.twap_lookback_window(),
            )?,
            PnlCalcOption::Oracle => {
                let index_price = self.get_underlying_price(&position.pair)?;
                math::mul_truncate(index_price, size)?
            }
        };

        Ok(PositionValuation {
            position_notional,
            unrealized_pnl: position.unrealized_pnl(position_notional),
        })
    }

    /// Spot and TWAP valuations combined by `preference`.
    pub fn preference_position_notional_and_unrealized_pnl<S: KvStore>(
        &self,
        ctx: &Context<S>,
        position: &Position,
        preference: PnlPreferenceOption,
    ) -> Result<PositionValuation, EngineError> {
        let spot = self.position_notional_and_unrealized_pnl(ctx, position, PnlCalcOption::SpotPrice)?;
        let twap = self.position_notional_and_unrealized_pnl(ctx, position, PnlCalcOption::Twap)?;
        Ok(spot.prefer(twap, preference))
    }
}
