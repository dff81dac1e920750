//! Position storage and the open/close flows.

use super::core::Engine;
use super::margin::require_more_margin_ratio;
use super::results::{EngineError, PositionResult};
use crate::context::Context;
use crate::custody::CollateralBank;
use crate::events::{
    BadDebtEvent, EventPayload, PositionChangedEvent, PositionClosedEvent, TransferDirection,
    TransferEvent,
};
use crate::math;
use crate::oracle::PriceOracle;
use crate::position::{increase_position, Position};
use crate::store::{KvStore, StoreKey};
use crate::types::{Coin, Leverage, Side, SignedSize, TokenPair, TraderAddr};
use rust_decimal::Decimal;

impl<O: PriceOracle, B: CollateralBank> Engine<O, B> {
    pub fn find_position<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        trader: &TraderAddr,
    ) -> Result<Option<Position>, EngineError> {
        Ok(ctx.store().get_record(&StoreKey::position(pair, trader))?)
    }

    pub fn get_position<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        trader: &TraderAddr,
    ) -> Result<Position, EngineError> {
        self.find_position(ctx, pair, trader)?
            .ok_or_else(|| EngineError::PositionNotFound {
                pair: pair.clone(),
                trader: trader.clone(),
            })
    }

    pub fn set_position<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        position: &Position,
    ) -> Result<(), EngineError> {
        ctx.store_mut()
            .set_record(&StoreKey::position(&position.pair, &position.trader), position)?;
        Ok(())
    }

    pub(super) fn delete_position<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        trader: &TraderAddr,
    ) {
        ctx.store_mut()
            .delete(StoreKey::position(pair, trader).as_bytes());
    }

    /// Opens a position, or grows one on the same side, with `margin * leverage` of quote.
    ///
    /// The resulting margin ratio must be at least the pool's maintenance
    /// margin ratio. `base_limit` bounds the base moved (zero disables it).
    #[allow(clippy::too_many_arguments)]
    pub fn open_position<S: KvStore>(
        &mut self,
        ctx: &mut Context<S>,
        trader: &TraderAddr,
        pair: &TokenPair,
        side: Side,
        margin: Decimal,
        leverage: Leverage,
        base_limit: Decimal,
    ) -> Result<PositionResult, EngineError> {
        if margin <= Decimal::ZERO {
            return Err(EngineError::NonPositiveMargin(margin));
        }
        let collateral = self.config.params.collateral_denom.clone();

        ctx.atomic(|ctx| -> Result<PositionResult, EngineError> {
            let pool = self.require_pool(ctx, pair)?;
            if leverage.value() > pool.config.max_leverage {
                return Err(EngineError::InvalidLeverage {
                    leverage: leverage.value(),
                    max_leverage: pool.config.max_leverage,
                });
            }

            let position = match self.find_position(ctx, pair, trader)? {
                Some(existing) => existing,
                None => {
                    let latest_cpf = self.latest_cumulative_premium_fraction(ctx, pair)?;
                    Position::new(pair.clone(), trader.clone(), latest_cpf, ctx.block_height())
                }
            };
            if let Some(existing) = position.side() {
                if existing != side {
                    return Err(EngineError::PositionSideMismatch {
                        existing,
                        requested: side,
                    });
                }
            }

            let notional = math::mul_truncate(margin, leverage.value())?;
            let swap = self.vpool_keeper.swap_quote_for_base(
                ctx,
                pair,
                side.open_direction(),
                notional,
                base_limit,
            )?;
            if swap.base_amount.is_zero() {
                return Err(EngineError::EmptyTrade(notional));
            }
            let exchanged_size = SignedSize::from_side(side, swap.base_amount).value();

            let remain = self.calc_remain_margin_with_funding_payment(ctx, &position, margin)?;
            if !remain.bad_debt.is_zero() {
                return Err(EngineError::HasBadDebt(remain.bad_debt));
            }
            let updated = increase_position(&position, exchanged_size, notional, &remain, ctx.block_height());

            let margin_ratio = self.get_margin_ratio(ctx, &updated)?;
            require_more_margin_ratio(margin_ratio, pool.config.maintenance_margin_ratio, true)?;

            self.set_position(ctx, &updated)?;
            let mark_price = self.vpool_keeper.get_pool(ctx, pair)?.mark_price();

            let coin = Coin::new(&collateral, margin);
            self.bank.send_from_account_to_vault(trader, &coin)?;

            ctx.emit_event(EventPayload::Transfer(TransferEvent {
                trader: trader.clone(),
                coin,
                direction: TransferDirection::ToVault,
            }));
            ctx.emit_event(EventPayload::PositionChanged(PositionChangedEvent {
                pair: pair.clone(),
                trader: trader.clone(),
                exchanged_quote: notional,
                exchanged_size,
                size: updated.size,
                margin: updated.margin,
                open_notional: updated.open_notional,
                mark_price,
                funding_payment: remain.funding_payment,
            }));
            log::info!(
                "{} opened {:?} {} on {} for {} quote, margin ratio {}",
                trader,
                side,
                swap.base_amount,
                pair,
                notional,
                margin_ratio
            );

            Ok(PositionResult {
                position: updated,
                exchanged_quote: notional,
                exchanged_size,
                realized_pnl: Decimal::ZERO,
                bad_debt: Decimal::ZERO,
                funding_payment: remain.funding_payment,
                margin_to_vault: margin,
            })
        })
    }

    /// Swaps the whole position back into the pool and pays out what is left of the margin.
    ///
    /// A shortfall is absorbed by the vault and reported as bad debt.
    pub fn close_position<S: KvStore>(
        &mut self,
        ctx: &mut Context<S>,
        trader: &TraderAddr,
        pair: &TokenPair,
    ) -> Result<PositionResult, EngineError> {
        let collateral = self.config.params.collateral_denom.clone();

        ctx.atomic(|ctx| -> Result<PositionResult, EngineError> {
            self.require_pool(ctx, pair)?;
            let position = self.get_position(ctx, pair, trader)?;
            if position.size.is_zero() {
                return Err(EngineError::PositionNotFound {
                    pair: pair.clone(),
                    trader: trader.clone(),
                });
            }

            let swap = self.vpool_keeper.swap_base_for_quote(
                ctx,
                pair,
                position.size.close_direction(),
                position.size.abs(),
                Decimal::ZERO,
            )?;
            let exit_notional = swap.quote_amount;
            let realized_pnl = position.unrealized_pnl(exit_notional);
            let remain = self.calc_remain_margin_with_funding_payment(ctx, &position, realized_pnl)?;

            self.delete_position(ctx, pair, trader);

            let payout = Coin::new(&collateral, remain.margin);
            if remain.margin > Decimal::ZERO {
                self.bank.send_from_vault_to_account(trader, &payout)?;
                ctx.emit_event(EventPayload::Transfer(TransferEvent {
                    trader: trader.clone(),
                    coin: payout,
                    direction: TransferDirection::FromVault,
                }));
            }
            if !remain.bad_debt.is_zero() {
                ctx.emit_event(EventPayload::BadDebt(BadDebtEvent {
                    pair: pair.clone(),
                    trader: trader.clone(),
                    bad_debt: remain.bad_debt,
                }));
                log::warn!("{} closed on {} with bad debt {}", trader, pair, remain.bad_debt);
            }
            ctx.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                pair: pair.clone(),
                trader: trader.clone(),
                closed_size: position.size,
                exit_notional,
                realized_pnl,
                margin_returned: remain.margin,
            }));
            log::info!(
                "{} closed {} on {}: pnl {}, returned {}",
                trader,
                position.size,
                pair,
                realized_pnl,
                remain.margin
            );

            let closed = Position {
                size: SignedSize::zero(),
                margin: Decimal::ZERO,
                open_notional: Decimal::ZERO,
                last_update_cumulative_premium_fraction: remain.latest_cumulative_premium_fraction,
                block_number: ctx.block_height(),
                ..position.clone()
            };
            Ok(PositionResult {
                position: closed,
                exchanged_quote: exit_notional,
                exchanged_size: -position.size.value(),
                realized_pnl,
                bad_debt: remain.bad_debt,
                funding_payment: remain.funding_payment,
                margin_to_vault: -remain.margin,
            })
        })
    }
}
