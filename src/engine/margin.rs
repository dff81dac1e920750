//! Margin accounting: add/remove margin, margin ratio, free collateral.

use super::core::Engine;
use super::results::{EngineError, RemoveMarginResult};
use crate::context::Context;
use crate::custody::CollateralBank;
use crate::events::{EventPayload, MarginChangedEvent, TransferDirection, TransferEvent};
use crate::math;
use crate::oracle::PriceOracle;
use crate::position::{calc_remain_margin, MarginCalculationResult, PnlPreferenceOption, Position};
use crate::store::KvStore;
use crate::types::{Coin, TokenPair, TraderAddr};
use rust_decimal::Decimal;

impl<O: PriceOracle, B: CollateralBank> Engine<O, B> {
    /// Moves `coin` from the trader into the vault and credits it to the position's margin.
    pub fn add_margin<S: KvStore>(
        &mut self,
        ctx: &mut Context<S>,
        trader: &TraderAddr,
        pair: &TokenPair,
        coin: Coin,
    ) -> Result<Position, EngineError> {
        self.validate_margin_coin(&coin)?;

        ctx.atomic(|ctx| -> Result<Position, EngineError> {
            self.require_pool(ctx, pair)?;
            let mut position = self.get_position(ctx, pair, trader)?;
            position.margin = math::add(position.margin, coin.amount)?;
            self.set_position(ctx, &position)?;

            self.bank.send_from_account_to_vault(trader, &coin)?;

            ctx.emit_event(EventPayload::Transfer(TransferEvent {
                trader: trader.clone(),
                coin: coin.clone(),
                direction: TransferDirection::ToVault,
            }));
            ctx.emit_event(EventPayload::MarginChanged(MarginChangedEvent {
                pair: pair.clone(),
                trader: trader.clone(),
                margin_delta: coin.amount,
                new_margin: position.margin,
                funding_payment: Decimal::ZERO,
            }));
            Ok(position)
        })
    }

    /// Withdraws `coin` of margin after settling pending funding.
    ///
    /// Rejected when the position ends up with bad debt or when free
    /// collateral would go negative. Nothing is written in either case.
    pub fn remove_margin<S: KvStore>(
        &mut self,
        ctx: &mut Context<S>,
        trader: &TraderAddr,
        pair: &TokenPair,
        coin: Coin,
    ) -> Result<RemoveMarginResult, EngineError> {
        self.validate_margin_coin(&coin)?;

        ctx.atomic(|ctx| -> Result<RemoveMarginResult, EngineError> {
            self.require_pool(ctx, pair)?;
            let mut position = self.get_position(ctx, pair, trader)?;

            let remain = self.calc_remain_margin_with_funding_payment(ctx, &position, -coin.amount)?;
            position.margin = remain.margin;
            position.last_update_cumulative_premium_fraction = remain.latest_cumulative_premium_fraction;
            if !remain.bad_debt.is_zero() {
                log::warn!(
                    "rejected margin removal of {} for {} on {}: bad debt {}",
                    coin,
                    trader,
                    pair,
                    remain.bad_debt
                );
                return Err(EngineError::HasBadDebt(remain.bad_debt));
            }

            let free_collateral = self.calc_free_collateral(ctx, &position)?;
            if free_collateral < Decimal::ZERO {
                log::warn!(
                    "rejected margin removal of {} for {} on {}: free collateral {}",
                    coin,
                    trader,
                    pair,
                    free_collateral
                );
                return Err(EngineError::InsufficientFreeCollateral(free_collateral));
            }

            self.set_position(ctx, &position)?;

            self.bank.send_from_vault_to_account(trader, &coin)?;

            ctx.emit_event(EventPayload::Transfer(TransferEvent {
                trader: trader.clone(),
                coin: coin.clone(),
                direction: TransferDirection::FromVault,
            }));
            ctx.emit_event(EventPayload::MarginChanged(MarginChangedEvent {
                pair: pair.clone(),
                trader: trader.clone(),
                margin_delta: -coin.amount,
                new_margin: position.margin,
                funding_payment: remain.funding_payment,
            }));
            Ok(RemoveMarginResult {
                margin_out: coin,
                funding_payment: remain.funding_payment,
                position,
            })
        })
    }

    /// (margin + max(pnl) - funding - bad_debt) / notional over the better of spot and TWAP.
    ///
    /// # Panics
    /// On a zero-size position; there is no ratio to speak of.
    pub fn get_margin_ratio<S: KvStore>(
        &self,
        ctx: &Context<S>,
        position: &Position,
    ) -> Result<Decimal, EngineError> {
        assert!(
            !position.size.is_zero(),
            "margin ratio of zero-size position for {} on {}",
            position.trader,
            position.pair
        );

        let value = self.preference_position_notional_and_unrealized_pnl(
            ctx,
            position,
            PnlPreferenceOption::Max,
        )?;
        let remain = self.calc_remain_margin_with_funding_payment(ctx, position, value.unrealized_pnl)?;
        let equity = math::sub(remain.margin, remain.bad_debt)?;
        Ok(math::quo_truncate(equity, value.position_notional)?)
    }

    pub fn calc_remain_margin_with_funding_payment<S: KvStore>(
        &self,
        ctx: &Context<S>,
        position: &Position,
        margin_delta: Decimal,
    ) -> Result<MarginCalculationResult, EngineError> {
        let latest_cpf = self.latest_cumulative_premium_fraction(ctx, &position.pair)?;
        Ok(calc_remain_margin(position, margin_delta, latest_cpf)?)
    }

    /// min(margin, margin + pnl) - notional / max_leverage, valued at the worse of spot and TWAP.
    pub fn calc_free_collateral<S: KvStore>(
        &self,
        ctx: &Context<S>,
        position: &Position,
    ) -> Result<Decimal, EngineError> {
        let pool = self.require_pool(ctx, &position.pair)?;
        let value = self.preference_position_notional_and_unrealized_pnl(
            ctx,
            position,
            PnlPreferenceOption::Min,
        )?;

        let free_margin = position
            .margin
            .min(math::add(position.margin, value.unrealized_pnl)?);
        let requirement = math::quo_truncate(value.position_notional, pool.config.max_leverage)?;
        Ok(math::sub(free_margin, requirement)?)
    }

    fn validate_margin_coin(&self, coin: &Coin) -> Result<(), EngineError> {
        let expected = &self.config.params.collateral_denom;
        if &coin.denom != expected {
            return Err(EngineError::InvalidMarginDenom {
                expected: expected.clone(),
                got: coin.denom.clone(),
            });
        }
        if coin.amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveMargin(coin.amount));
        }
        Ok(())
    }
}

/// `ratio >= base` when `larger_than_or_equal_to`, else `ratio < base`.
pub fn require_more_margin_ratio(
    ratio: Decimal,
    base: Decimal,
    larger_than_or_equal_to: bool,
) -> Result<(), EngineError> {
    let holds = if larger_than_or_equal_to {
        ratio >= base
    } else {
        ratio < base
    };
    if holds {
        Ok(())
    } else {
        Err(EngineError::MarginRatioViolation {
            ratio,
            base,
            larger_than_or_equal_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{BankError, MockBank};
    use crate::engine::EngineConfig;
    use crate::oracle::MockOracle;
    use crate::store::MemStore;
    use crate::types::{SignedSize, Timestamp};
    use rust_decimal_macros::dec;

    fn pair() -> TokenPair {
        TokenPair::new("ubtc", "unusd").unwrap()
    }

    fn alice() -> TraderAddr {
        TraderAddr::new("nibi1alice").unwrap()
    }

    fn usd(amount: Decimal) -> Coin {
        Coin::new("unusd", amount)
    }

    // pool 1e6 / 1e6 with a 10-long, margin 10, opened at notional 10
    fn setup() -> (Engine<MockOracle, MockBank>, Context<MemStore>) {
        let oracle = MockOracle::new().with_price(&pair(), dec!(1));
        let engine = Engine::new(EngineConfig::default(), oracle, MockBank::new()).unwrap();
        let mut ctx = engine
            .new_context(MemStore::new())
            .with_block(1, Timestamp::from_millis(1_000));
        engine
            .create_pool(&mut ctx, pair(), dec!(1), dec!(1_000_000), dec!(1_000_000), dec!(1), None)
            .unwrap();
        let position = Position {
            pair: pair(),
            trader: alice(),
            size: SignedSize::new(dec!(10)),
            margin: dec!(10),
            open_notional: dec!(10),
            last_update_cumulative_premium_fraction: Decimal::ZERO,
            block_number: 1,
        };
        engine.set_position(&mut ctx, &position).unwrap();
        ctx.advance_block(60_000);
        (engine, ctx)
    }

    #[test]
    fn margin_ratio_of_fresh_long() {
        let (engine, ctx) = setup();
        let position = engine.get_position(&ctx, &pair(), &alice()).unwrap();
        assert_eq!(engine.get_margin_ratio(&ctx, &position).unwrap(), dec!(1));
    }

    #[test]
    #[should_panic(expected = "zero-size position")]
    fn margin_ratio_of_empty_position_panics() {
        let (engine, ctx) = setup();
        let mut position = engine.get_position(&ctx, &pair(), &alice()).unwrap();
        position.size = SignedSize::zero();
        let _ = engine.get_margin_ratio(&ctx, &position);
    }

    #[test]
    fn add_margin_credits_and_transfers() {
        let (mut engine, mut ctx) = setup();
        let position = engine
            .add_margin(&mut ctx, &alice(), &pair(), usd(dec!(5)))
            .unwrap();
        assert_eq!(position.margin, dec!(15));
        assert_eq!(
            engine.get_position(&ctx, &pair(), &alice()).unwrap().margin,
            dec!(15)
        );
        assert_eq!(engine.bank().transfers().len(), 1);
        assert_eq!(engine.bank().transfers()[0].0, TransferDirection::ToVault);
    }

    #[test]
    fn add_margin_validates_before_reading_state() {
        let (mut engine, mut ctx) = setup();
        let before = ctx.store().clone();

        let err = engine
            .add_margin(&mut ctx, &alice(), &pair(), Coin::new("ubtc", dec!(5)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMarginDenom { .. }));

        let err = engine
            .add_margin(&mut ctx, &alice(), &pair(), usd(Decimal::ZERO))
            .unwrap_err();
        assert_eq!(err, EngineError::NonPositiveMargin(Decimal::ZERO));

        assert_eq!(ctx.store(), &before);
        assert!(engine.bank().transfers().is_empty());
    }

    #[test]
    fn add_margin_bank_failure_rolls_back() {
        let (mut engine, mut ctx) = setup();
        engine.bank_mut().fail_with(BankError::Rejected("frozen".into()));
        let before = ctx.store().clone();
        let events_before = ctx.events().len();

        let err = engine
            .add_margin(&mut ctx, &alice(), &pair(), usd(dec!(5)))
            .unwrap_err();
        assert_eq!(err, EngineError::Bank(BankError::Rejected("frozen".into())));
        assert_eq!(ctx.store(), &before);
        assert_eq!(ctx.events().len(), events_before);
    }

    #[test]
    fn add_margin_needs_position() {
        let (mut engine, mut ctx) = setup();
        let bob = TraderAddr::new("nibi1bob").unwrap();
        let err = engine
            .add_margin(&mut ctx, &bob, &pair(), usd(dec!(5)))
            .unwrap_err();
        assert!(matches!(err, EngineError::PositionNotFound { .. }));
    }

    #[test]
    fn remove_margin_within_free_collateral() {
        let (mut engine, mut ctx) = setup();
        let result = engine
            .remove_margin(&mut ctx, &alice(), &pair(), usd(dec!(5)))
            .unwrap();
        assert_eq!(result.margin_out, usd(dec!(5)));
        assert_eq!(result.funding_payment, Decimal::ZERO);
        assert_eq!(
            engine.get_position(&ctx, &pair(), &alice()).unwrap().margin,
            dec!(5)
        );
        assert_eq!(engine.bank().transfers()[0].0, TransferDirection::FromVault);
    }

    #[test]
    fn remove_margin_beyond_free_collateral() {
        let (mut engine, mut ctx) = setup();
        let err = engine
            .remove_margin(&mut ctx, &alice(), &pair(), usd(dec!(9.5)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFreeCollateral(_)));
        assert_eq!(
            engine.get_position(&ctx, &pair(), &alice()).unwrap().margin,
            dec!(10)
        );
        assert!(engine.bank().transfers().is_empty());
    }

    #[test]
    fn remove_margin_with_bad_debt() {
        let (mut engine, mut ctx) = setup();
        // funding of 0.5 per base eats 5 of the 10 margin
        let mut meta = engine.get_pair_metadata(&ctx, &pair()).unwrap();
        meta.push_premium_fraction(dec!(0.5)).unwrap();
        engine.set_pair_metadata(&mut ctx, &meta).unwrap();

        let err = engine
            .remove_margin(&mut ctx, &alice(), &pair(), usd(dec!(6)))
            .unwrap_err();
        assert_eq!(err, EngineError::HasBadDebt(dec!(1)));
        let stored = engine.get_position(&ctx, &pair(), &alice()).unwrap();
        assert_eq!(stored.margin, dec!(10));
        assert_eq!(stored.last_update_cumulative_premium_fraction, Decimal::ZERO);
    }

    #[test]
    fn remove_margin_settles_funding() {
        let (mut engine, mut ctx) = setup();
        let mut meta = engine.get_pair_metadata(&ctx, &pair()).unwrap();
        meta.push_premium_fraction(dec!(0.1)).unwrap();
        engine.set_pair_metadata(&mut ctx, &meta).unwrap();

        let result = engine
            .remove_margin(&mut ctx, &alice(), &pair(), usd(dec!(2)))
            .unwrap();
        assert_eq!(result.funding_payment, dec!(1));
        assert_eq!(result.position.margin, dec!(7));
        assert_eq!(result.position.last_update_cumulative_premium_fraction, dec!(0.1));
    }

    #[test]
    fn free_collateral_of_fresh_long() {
        let (engine, ctx) = setup();
        let position = engine.get_position(&ctx, &pair(), &alice()).unwrap();
        // min(10, 9.99990000099999) - 9.99990000099999 / 10
        assert_eq!(
            engine.calc_free_collateral(&ctx, &position).unwrap(),
            dec!(8.999910000899991)
        );
    }

    #[test]
    fn margin_ratio_requirement() {
        assert!(require_more_margin_ratio(dec!(0.1), dec!(0.1), true).is_ok());
        assert!(require_more_margin_ratio(dec!(0.09), dec!(0.1), true).is_err());
        assert!(require_more_margin_ratio(dec!(0.09), dec!(0.1), false).is_ok());
        assert_eq!(
            require_more_margin_ratio(dec!(0.1), dec!(0.1), false),
            Err(EngineError::MarginRatioViolation {
                ratio: dec!(0.1),
                base: dec!(0.1),
                larger_than_or_equal_to: false,
            })
        );
    }
}
