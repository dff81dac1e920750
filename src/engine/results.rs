// 8.0.2: result types and errors for engine operations.

use crate::amm::AmmError;
use crate::config::ConfigError;
use crate::custody::BankError;
use crate::math::MathError;
use crate::oracle::OracleError;
use crate::position::Position;
use crate::store::StoreError;
use crate::types::{Coin, Side, TokenPair, TraderAddr, TypeError};
use crate::vpool::VpoolError;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveMarginResult {
    pub margin_out: Coin,
    pub funding_payment: Decimal,
    pub position: Position,
}

/// Outcome of opening, increasing or closing a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionResult {
    pub position: Position,
    pub exchanged_quote: Decimal,
    pub exchanged_size: Decimal,
    pub realized_pnl: Decimal,
    pub bad_debt: Decimal,
    pub funding_payment: Decimal,
    // positive: trader -> vault, negative: vault -> trader
    pub margin_to_vault: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingResult {
    pub mark_twap: Decimal,
    pub index_price: Decimal,
    pub premium_fraction: Decimal,
    pub cumulative_premium_fraction: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Position not found for {trader} on {pair}")]
    PositionNotFound { pair: TokenPair, trader: TraderAddr },

    #[error("Pair metadata not found for {0}")]
    PairMetadataNotFound(TokenPair),

    #[error("Invalid margin denom: expected {expected}, got {got}")]
    InvalidMarginDenom { expected: String, got: String },

    #[error("Margin must be positive, got {0}")]
    NonPositiveMargin(Decimal),

    #[error("Leverage {leverage} must be within (0, {max_leverage}]")]
    InvalidLeverage {
        leverage: Decimal,
        max_leverage: Decimal,
    },

    #[error("Position is {existing:?}, cannot add a {requested:?} trade")]
    PositionSideMismatch { existing: Side, requested: Side },

    #[error("Trade of {0} quote moves no base")]
    EmptyTrade(Decimal),

    #[error("Position has bad debt of {0}")]
    HasBadDebt(Decimal),

    #[error("Not enough free collateral: {0}")]
    InsufficientFreeCollateral(Decimal),

    #[error("Margin ratio {ratio} did not meet base {base} (larger_than_or_equal_to = {larger_than_or_equal_to})")]
    MarginRatioViolation {
        ratio: Decimal,
        base: Decimal,
        larger_than_or_equal_to: bool,
    },

    #[error("Pool error: {0}")]
    Amm(#[from] AmmError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Bank error: {0}")]
    Bank(#[from] BankError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Invalid input: {0}")]
    Type(#[from] TypeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<VpoolError> for EngineError {
    fn from(err: VpoolError) -> Self {
        EngineError::Amm(AmmError::Vpool(err))
    }
}
