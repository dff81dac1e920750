// 4.0: open position tracking. pnl is measured against open_notional, funding against
// the cumulative premium fraction the position last settled at.

use crate::math::{self, MathError};
use crate::types::{Side, SignedSize, TokenPair, TraderAddr};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pair: TokenPair,
    pub trader: TraderAddr,
    pub size: SignedSize,
    pub margin: Decimal,
    pub open_notional: Decimal,
    pub last_update_cumulative_premium_fraction: Decimal,
    pub block_number: i64,
}

impl Position {
    pub fn new(pair: TokenPair, trader: TraderAddr, latest_cpf: Decimal, block_number: i64) -> Self {
        Self {
            pair,
            trader,
            size: SignedSize::zero(),
            margin: Decimal::ZERO,
            open_notional: Decimal::ZERO,
            last_update_cumulative_premium_fraction: latest_cpf,
            block_number,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        self.size.side()
    }

    // (latest - last) * size. longs pay a positive fraction, shorts receive it
    pub fn funding_payment(&self, latest_cpf: Decimal) -> Result<Decimal, MathError> {
        if self.size.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let delta = math::sub(latest_cpf, self.last_update_cumulative_premium_fraction)?;
        math::mul_truncate(delta, self.size.value())
    }

    pub fn unrealized_pnl(&self, position_notional: Decimal) -> Decimal {
        unrealized_pnl(self.size, self.open_notional, position_notional)
    }
}

// 4.1: notional - open for longs, open - notional for shorts
pub fn unrealized_pnl(size: SignedSize, open_notional: Decimal, position_notional: Decimal) -> Decimal {
    if size.is_short() {
        open_notional - position_notional
    } else if size.is_long() {
        position_notional - open_notional
    } else {
        Decimal::ZERO
    }
}

/// Price source used to value a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlCalcOption {
    SpotPrice,
    Twap,
    Oracle,
}

/// Which of the spot and TWAP valuations wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlPreferenceOption {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub position_notional: Decimal,
    pub unrealized_pnl: Decimal,
}

impl PositionValuation {
    pub fn zero() -> Self {
        Self {
            position_notional: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    /// notional and pnl are each picked independently
    pub fn prefer(self, other: Self, preference: PnlPreferenceOption) -> Self {
        match preference {
            PnlPreferenceOption::Max => Self {
                position_notional: self.position_notional.max(other.position_notional),
                unrealized_pnl: self.unrealized_pnl.max(other.unrealized_pnl),
            },
            PnlPreferenceOption::Min => Self {
                position_notional: self.position_notional.min(other.position_notional),
                unrealized_pnl: self.unrealized_pnl.min(other.unrealized_pnl),
            },
        }
    }
}

/// What remains of a position's margin after a delta and pending funding.
/// Pure: the caller decides whether to write it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCalculationResult {
    pub margin: Decimal,
    pub bad_debt: Decimal,
    pub funding_payment: Decimal,
    pub latest_cumulative_premium_fraction: Decimal,
}

// 4.2: margin + delta - funding. a negative remainder is bad debt, margin floors at zero
pub fn calc_remain_margin(
    position: &Position,
    margin_delta: Decimal,
    latest_cpf: Decimal,
) -> Result<MarginCalculationResult, MathError> {
    let funding_payment = position.funding_payment(latest_cpf)?;
    let remaining = math::sub(math::add(position.margin, margin_delta)?, funding_payment)?;

    let (margin, bad_debt) = if remaining.is_sign_negative() && !remaining.is_zero() {
        (Decimal::ZERO, remaining.abs())
    } else {
        (remaining, Decimal::ZERO)
    };

    Ok(MarginCalculationResult {
        margin,
        bad_debt,
        funding_payment,
        latest_cumulative_premium_fraction: latest_cpf,
    })
}

// 4.3: same-side increase. size and open notional accumulate
pub fn increase_position(
    position: &Position,
    exchanged_size: Decimal,
    exchanged_notional: Decimal,
    remain: &MarginCalculationResult,
    block_number: i64,
) -> Position {
    Position {
        size: position.size.add(exchanged_size),
        margin: remain.margin,
        open_notional: position.open_notional + exchanged_notional,
        last_update_cumulative_premium_fraction: remain.latest_cumulative_premium_fraction,
        block_number,
        ..position.clone()
    }
}
