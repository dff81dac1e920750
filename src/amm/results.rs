// 2.0.2: errors and result types for pool keeper operations.

use crate::math::MathError;
use crate::store::StoreError;
use crate::types::{Direction, TokenPair};
use crate::vpool::VpoolError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmmError {
    #[error("Pool {0} not found")]
    PoolNotFound(TokenPair),

    #[error("Pool {0} already exists")]
    PoolAlreadyExists(TokenPair),

    #[error("Snapshot {counter} not found for pool {pair}")]
    SnapshotNotFound { pair: TokenPair, counter: u64 },

    #[error("Snapshot counter not found for pool {0}")]
    SnapshotCounterNotFound(TokenPair),

    #[error("Swap of {amount} exceeds the trading limit of pool {pair}")]
    OverTradingLimit { pair: TokenPair, amount: Decimal },

    #[error("Swap output {amount} fails user limit {limit} ({direction:?})")]
    AssetFailsUserLimit {
        amount: Decimal,
        limit: Decimal,
        direction: Direction,
    },

    #[error("Mark price {mark_price} of pool {pair} is over the fluctuation limit")]
    OverFluctuationLimit { pair: TokenPair, mark_price: Decimal },

    #[error("Pool error: {0}")]
    Vpool(#[from] VpoolError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

/// Outcome of a reserve-mutating swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    pub pair: TokenPair,
    pub direction: Direction,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    // None when a zero-amount swap left the pool untouched
    pub snapshot_counter: Option<u64>,
}

impl SwapResult {
    pub(super) fn noop(pair: &TokenPair, direction: Direction) -> Self {
        Self {
            pair: pair.clone(),
            direction,
            quote_amount: Decimal::ZERO,
            base_amount: Decimal::ZERO,
            snapshot_counter: None,
        }
    }
}
