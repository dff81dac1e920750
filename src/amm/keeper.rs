// 2.1 amm/keeper.rs: pool lifecycle. creation, lookup, config replacement, reserve commits.

use super::results::AmmError;
use crate::config::VpoolConfig;
use crate::context::Context;
use crate::events::{EventPayload, PoolCreatedEvent};
use crate::store::{encode, KvStore, StoreKey};
use crate::types::TokenPair;
use crate::vpool::{Vpool, VpoolError};
use rust_decimal::Decimal;

/** 2.1.1: stateless handle over the pool records held in the context store */
#[derive(Debug, Clone, Copy, Default)]
pub struct VpoolKeeper;

impl VpoolKeeper {
    pub fn new() -> Self {
        Self
    }

    /// Creates the pool for `pair` and writes snapshot 0.
    ///
    /// The two ratio arguments always win over the matching fields of
    /// `config` (or of `VpoolConfig::default()` when none is given).
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
    ) -> Result<Vpool, AmmError> {
        pair.validate().map_err(VpoolError::from)?;
        if self.exists_pool(ctx, &pair) {
            return Err(AmmError::PoolAlreadyExists(pair));
        }
        // zero is rejected too: a pool must be able to price both sides
        if quote_reserve <= Decimal::ZERO || base_reserve <= Decimal::ZERO {
            return Err(VpoolError::InvalidReserve {
                base: base_reserve,
                quote: quote_reserve,
            }
            .into());
        }

        let config = config
            .unwrap_or_default()
            .with_trade_limit_ratio(trade_limit_ratio)
            .with_fluctuation_limit_ratio(fluctuation_limit_ratio);
        let pool = Vpool::try_new(pair.clone(), quote_reserve, base_reserve, config)?;
        pool.validate()?;

        let snapshot = pool.to_snapshot(ctx.block_time(), ctx.block_height());
        let pool_raw = encode(&StoreKey::pool(&pair), &pool)?;
        let snapshot_key = StoreKey::snapshot(&pair, 0);
        let snapshot_raw = encode(&snapshot_key, &snapshot)?;
        let counter_key = StoreKey::snapshot_counter(&pair);
        let counter_raw = encode(&counter_key, &0u64)?;

        let store = ctx.store_mut();
        store.set(StoreKey::pool(&pair).as_bytes().to_vec(), pool_raw);
        store.set(snapshot_key.as_bytes().to_vec(), snapshot_raw);
        store.set(counter_key.as_bytes().to_vec(), counter_raw);

        ctx.emit_event(EventPayload::PoolCreated(PoolCreatedEvent {
            pair: pair.clone(),
            quote_asset_reserve: quote_reserve,
            base_asset_reserve: base_reserve,
        }));
        self.emit_snapshot_saved(ctx, &snapshot, 0);

        log::info!(
            "created pool {} with reserves {} quote / {} base at {}",
            pair,
            quote_reserve,
            base_reserve,
            ctx.block_time()
        );
        Ok(pool)
    }

    pub fn exists_pool<S: KvStore>(&self, ctx: &Context<S>, pair: &TokenPair) -> bool {
        ctx.store().has(StoreKey::pool(pair).as_bytes())
    }

    pub fn get_pool<S: KvStore>(&self, ctx: &Context<S>, pair: &TokenPair) -> Result<Vpool, AmmError> {
        ctx.store()
            .get_record(&StoreKey::pool(pair))?
            .ok_or_else(|| AmmError::PoolNotFound(pair.clone()))
    }

    /// Replaces the whole config of an existing pool.
    pub fn set_pool_config<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        config: VpoolConfig,
    ) -> Result<Vpool, AmmError> {
        config.validate().map_err(VpoolError::from)?;
        let mut pool = self.get_pool(ctx, pair)?;
        pool.config = config;
        ctx.store_mut().set_record(&StoreKey::pool(pair), &pool)?;
        Ok(pool)
    }

    /// Persists mutated reserves: re-derives depth, rewrites the pool, appends a snapshot.
    pub(super) fn commit_reserves<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        mut pool: Vpool,
    ) -> Result<(Vpool, u64), AmmError> {
        if pool.base_asset_reserve <= Decimal::ZERO {
            return Err(VpoolError::BaseReserveAtZero.into());
        }
        if pool.quote_asset_reserve <= Decimal::ZERO {
            return Err(VpoolError::QuoteReserveAtZero.into());
        }
        pool.refresh_sqrt_depth()?;

        let pool_key = StoreKey::pool(&pool.pair);
        let pool_raw = encode(&pool_key, &pool)?;
        let counter = self.add_reserve_snapshot(ctx, &pool)?;
        ctx.store_mut().set(pool_key.as_bytes().to_vec(), pool_raw);
        Ok((pool, counter))
    }
}
