//! Funding rate settlement.

use super::core::Engine;
use super::results::{EngineError, FundingResult};
use crate::context::Context;
use crate::custody::CollateralBank;
use crate::events::{EventPayload, FundingRateChangedEvent};
use crate::funding::calculate_premium_fraction;
use crate::oracle::PriceOracle;
use crate::store::KvStore;
use crate::types::TokenPair;

impl<O: PriceOracle, B: CollateralBank> Engine<O, B> {
    /// Settles one premium fraction for `pair`, priced from the spot TWAP over
    /// one funding interval against the oracle index.
    ///
    /// Positions are not touched here; each pays the difference the next time
    /// its margin is recomputed.
    pub fn settle_funding<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
    ) -> Result<FundingResult, EngineError> {
        let interval = self.config.params.funding_interval();

        ctx.atomic(|ctx| -> Result<FundingResult, EngineError> {
            let mut metadata = self.get_pair_metadata(ctx, pair)?;
            let mark_twap = self.vpool_keeper.get_spot_twap(ctx, pair, interval)?;
            let index_price = self.get_underlying_price(pair)?;

            let premium_fraction = calculate_premium_fraction(mark_twap, index_price, interval)?;
            let cumulative_premium_fraction = metadata.push_premium_fraction(premium_fraction)?;
            self.set_pair_metadata(ctx, &metadata)?;

            ctx.emit_event(EventPayload::FundingRateChanged(FundingRateChangedEvent {
                pair: pair.clone(),
                mark_twap,
                index_price,
                premium_fraction,
                cumulative_premium_fraction,
            }));
            log::info!(
                "{} funding at {}: twap {} index {} premium {} cumulative {}",
                pair,
                ctx.block_time(),
                mark_twap,
                index_price,
                premium_fraction,
                cumulative_premium_fraction
            );

            Ok(FundingResult {
                mark_twap,
                index_price,
                premium_fraction,
                cumulative_premium_fraction,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::custody::MockBank;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::events::EventPayload;
    use crate::oracle::{MockOracle, OracleError};
    use crate::position::Position;
    use crate::store::MemStore;
    use crate::types::{SignedSize, Timestamp, TokenPair, TraderAddr};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pair() -> TokenPair {
        TokenPair::new("ubtc", "unusd").unwrap()
    }

    fn setup(index: Decimal) -> (Engine<MockOracle, MockBank>, Context<MemStore>) {
        let oracle = MockOracle::new().with_price(&pair(), index);
        let engine = Engine::new(EngineConfig::default(), oracle, MockBank::new()).unwrap();
        let mut ctx = engine
            .new_context(MemStore::new())
            .with_block(1, Timestamp::from_millis(1_000));
        engine
            .create_pool(&mut ctx, pair(), dec!(1), dec!(1_000_000), dec!(1_000_000), dec!(1), None)
            .unwrap();
        ctx.advance_block(60_000);
        (engine, ctx)
    }

    #[test]
    fn longs_pay_when_mark_above_index() {
        let (engine, mut ctx) = setup(dec!(0.9));
        let result = engine.settle_funding(&mut ctx, &pair()).unwrap();

        assert_eq!(result.mark_twap, dec!(1));
        assert_eq!(result.premium_fraction, dec!(0.004166666666666666));
        assert_eq!(result.cumulative_premium_fraction, dec!(0.004166666666666666));

        let meta = engine.get_pair_metadata(&ctx, &pair()).unwrap();
        assert_eq!(meta.settlement_count, 1);
        assert!(matches!(
            ctx.events().last().map(|e| &e.payload),
            Some(EventPayload::FundingRateChanged(_))
        ));

        let position = Position {
            pair: pair(),
            trader: TraderAddr::new("nibi1alice").unwrap(),
            size: SignedSize::new(dec!(100)),
            margin: dec!(10),
            open_notional: dec!(100),
            last_update_cumulative_premium_fraction: Decimal::ZERO,
            block_number: 1,
        };
        let remain = engine
            .calc_remain_margin_with_funding_payment(&ctx, &position, Decimal::ZERO)
            .unwrap();
        assert_eq!(remain.funding_payment, dec!(0.4166666666666666));
        assert_eq!(remain.margin, dec!(9.5833333333333334));
    }

    #[test]
    fn fractions_accumulate() {
        let (engine, mut ctx) = setup(dec!(1.1));
        engine.settle_funding(&mut ctx, &pair()).unwrap();
        ctx.advance_block(3_600_000);
        let second = engine.settle_funding(&mut ctx, &pair()).unwrap();

        assert_eq!(second.premium_fraction, dec!(-0.004166666666666666));
        assert_eq!(second.cumulative_premium_fraction, dec!(-0.008333333333333332));

        // the metadata keeps only the running total, history sits in per-index records
        let meta = engine.get_pair_metadata(&ctx, &pair()).unwrap();
        assert_eq!(meta.settlement_count, 2);
        assert_eq!(meta.latest_cumulative_premium_fraction(), second.cumulative_premium_fraction);
        let history: Vec<_> = (0..=3)
            .map(|i| engine.get_cumulative_premium_fraction(&ctx, &pair(), i).unwrap())
            .collect();
        assert_eq!(
            history,
            vec![
                Some(Decimal::ZERO),
                Some(dec!(-0.004166666666666666)),
                Some(dec!(-0.008333333333333332)),
                None
            ]
        );
    }

    #[test]
    fn oracle_failure_writes_nothing() {
        let (mut engine, mut ctx) = setup(dec!(1));
        engine
            .oracle_mut()
            .fail_with(OracleError::Unavailable("stale".into()));
        let before = ctx.store().clone();
        let events = ctx.events().len();

        assert!(matches!(
            engine.settle_funding(&mut ctx, &pair()),
            Err(EngineError::Oracle(_))
        ));
        assert_eq!(ctx.store(), &before);
        assert_eq!(ctx.events().len(), events);
    }

    #[test]
    fn unknown_pair() {
        let (engine, mut ctx) = setup(dec!(1));
        let other = TokenPair::new("ueth", "unusd").unwrap();
        assert_eq!(
            engine.settle_funding(&mut ctx, &other),
            Err(EngineError::PairMetadataNotFound(other))
        );
    }
}
