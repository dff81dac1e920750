// 3.0 snapshot.rs: one immutable reserve state per mutation. keyed by (pair, counter).
// counter 0 is written at pool creation; every later mutation writes latest + 1.

use crate::math;
use crate::types::{Direction, Timestamp, TokenPair, TwapCalcOption};
use crate::vpool::{self, VpoolError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub pair: TokenPair,
    pub quote_asset_reserve: Decimal,
    pub base_asset_reserve: Decimal,
    pub timestamp_ms: i64,
    pub block_number: i64,
}

impl ReserveSnapshot {
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.timestamp_ms)
    }

    /// quote / base at the time of the snapshot, zero for an empty side
    pub fn mark_price(&self) -> Decimal {
        if self.base_asset_reserve.is_zero() || self.quote_asset_reserve.is_zero() {
            return Decimal::ZERO;
        }
        math::quo_truncate(self.quote_asset_reserve, self.base_asset_reserve)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn upper_fluctuation_limit(&self, ratio: Decimal) -> Decimal {
        self.mark_price() * (Decimal::ONE + ratio)
    }

    pub fn lower_fluctuation_limit(&self, ratio: Decimal) -> Decimal {
        self.mark_price() * (Decimal::ONE - ratio)
    }

    /** 3.1: the price a TWAP integrates for this snapshot */
    pub fn price_for(
        &self,
        option: TwapCalcOption,
        dir: Direction,
        amount: Decimal,
    ) -> Result<Decimal, VpoolError> {
        match option {
            TwapCalcOption::Spot => Ok(math::quo_truncate(
                self.quote_asset_reserve,
                self.base_asset_reserve,
            )?),
            TwapCalcOption::QuoteAssetSwap => vpool::base_amount_by_quote_amount(
                self.quote_asset_reserve,
                self.base_asset_reserve,
                dir,
                amount,
            ),
            TwapCalcOption::BaseAssetSwap => vpool::quote_amount_by_base_amount(
                self.quote_asset_reserve,
                self.base_asset_reserve,
                dir,
                amount,
            ),
        }
    }
}
