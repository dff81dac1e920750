// 8.0 engine/core.rs: main engine. holds the pool keeper, the oracle and the bank; all state lives in the context store.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::amm::VpoolKeeper;
use crate::config::VpoolConfig;
use crate::context::Context;
use crate::custody::CollateralBank;
use crate::funding::PairMetadata;
use crate::oracle::PriceOracle;
use crate::store::{KvStore, StoreKey};
use crate::types::TokenPair;
use crate::vpool::Vpool;
use rust_decimal::Decimal;

/** 8.1: main engine struct. external services are injected, nothing global */
#[derive(Debug)]
pub struct Engine<O: PriceOracle, B: CollateralBank> {
    pub(super) config: EngineConfig,
    pub(super) vpool_keeper: VpoolKeeper,
    pub(super) oracle: O,
    pub(super) bank: B,
}

impl<O: PriceOracle, B: CollateralBank> Engine<O, B> {
    pub fn new(config: EngineConfig, oracle: O, bank: B) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            vpool_keeper: VpoolKeeper::new(),
            oracle,
            bank,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vpool_keeper(&self) -> &VpoolKeeper {
        &self.vpool_keeper
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Context preconfigured with this engine's event bound.
    pub fn new_context<S: KvStore>(&self, store: S) -> Context<S> {
        Context::new(store).with_max_events(self.config.max_events)
    }

    /// Creates the pool and starts its funding history at `[0]`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_pool<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: TokenPair,
        trade_limit_ratio: Decimal,
        quote_reserve: Decimal,
        base_reserve: Decimal,
        fluctuation_limit_ratio: Decimal,
        config: Option<VpoolConfig>,
    ) -> Result<Vpool, EngineError> {
        ctx.atomic(|ctx| -> Result<Vpool, EngineError> {
            let pool = self.vpool_keeper.create_pool(
                ctx,
                pair.clone(),
                trade_limit_ratio,
                quote_reserve,
                base_reserve,
                fluctuation_limit_ratio,
                config,
            )?;
            self.set_pair_metadata(ctx, &PairMetadata::new(pair))?;
            Ok(pool)
        })
    }

    pub fn get_pair_metadata<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<PairMetadata, EngineError> {
        ctx.store()
            .get_record(&StoreKey::pair_metadata(pair))?
            .ok_or_else(|| EngineError::PairMetadataNotFound(pair.clone()))
    }

    /// Writes the metadata and records its latest cumulative fraction under
    /// its settlement index.
    pub(super) fn set_pair_metadata<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        metadata: &PairMetadata,
    ) -> Result<(), EngineError> {
        let store = ctx.store_mut();
        store.set_record(&StoreKey::pair_metadata(&metadata.pair), metadata)?;
        store.set_record(
            &StoreKey::premium_fraction(&metadata.pair, metadata.settlement_count),
            &metadata.cumulative_premium_fraction,
        )?;
        Ok(())
    }

    /// Cumulative premium fraction as it stood after settlement `index`.
    pub fn get_cumulative_premium_fraction<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        index: u64,
    ) -> Result<Option<Decimal>, EngineError> {
        Ok(ctx
            .store()
            .get_record(&StoreKey::premium_fraction(pair, index))?)
    }

    pub fn latest_cumulative_premium_fraction<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<Decimal, EngineError> {
        Ok(self
            .get_pair_metadata(ctx, pair)?
            .latest_cumulative_premium_fraction())
    }

    pub(super) fn require_pool<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<Vpool, EngineError> {
        Ok(self.vpool_keeper.get_pool(ctx, pair)?)
    }
}
