// 11.0: every state change produces an event. the log is the replayable audit trail;
// it is committed together with the store writes of the same operation or not at all.

use crate::types::{Coin, Direction, SignedSize, Timestamp, TokenPair, TraderAddr};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub block_height: i64,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, block_height: i64, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            block_height,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Pool events
    PoolCreated(PoolCreatedEvent),
    SnapshotSaved(SnapshotSavedEvent),
    SwapQuoteForBase(SwapEvent),
    SwapBaseForQuote(SwapEvent),

    // Margin events
    MarginChanged(MarginChangedEvent),
    Transfer(TransferEvent),

    // Position events
    PositionChanged(PositionChangedEvent),
    PositionClosed(PositionClosedEvent),

    // Funding and risk events
    FundingRateChanged(FundingRateChangedEvent),
    BadDebt(BadDebtEvent),
}

impl EventPayload {
    pub fn pair(&self) -> Option<&TokenPair> {
        match self {
            EventPayload::PoolCreated(e) => Some(&e.pair),
            EventPayload::SnapshotSaved(e) => Some(&e.pair),
            EventPayload::SwapQuoteForBase(e) | EventPayload::SwapBaseForQuote(e) => Some(&e.pair),
            EventPayload::MarginChanged(e) => Some(&e.pair),
            EventPayload::Transfer(_) => None,
            EventPayload::PositionChanged(e) => Some(&e.pair),
            EventPayload::PositionClosed(e) => Some(&e.pair),
            EventPayload::FundingRateChanged(e) => Some(&e.pair),
            EventPayload::BadDebt(e) => Some(&e.pair),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreatedEvent {
    pub pair: TokenPair,
    pub quote_asset_reserve: Decimal,
    pub base_asset_reserve: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSavedEvent {
    pub pair: TokenPair,
    pub counter: u64,
    pub quote_asset_reserve: Decimal,
    pub base_asset_reserve: Decimal,
}

/// `quote_amount` and `base_amount` are the absolute legs of the trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub pair: TokenPair,
    pub direction: Direction,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginChangedEvent {
    pub pair: TokenPair,
    pub trader: TraderAddr,
    pub margin_delta: Decimal,
    pub new_margin: Decimal,
    pub funding_payment: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    ToVault,
    FromVault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub trader: TraderAddr,
    pub coin: Coin,
    pub direction: TransferDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChangedEvent {
    pub pair: TokenPair,
    pub trader: TraderAddr,
    pub exchanged_quote: Decimal,
    pub exchanged_size: Decimal,
    pub size: SignedSize,
    pub margin: Decimal,
    pub open_notional: Decimal,
    pub mark_price: Decimal,
    pub funding_payment: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub pair: TokenPair,
    pub trader: TraderAddr,
    pub closed_size: SignedSize,
    pub exit_notional: Decimal,
    pub realized_pnl: Decimal,
    pub margin_returned: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRateChangedEvent {
    pub pair: TokenPair,
    pub mark_twap: Decimal,
    pub index_price: Decimal,
    pub premium_fraction: Decimal,
    pub cumulative_premium_fraction: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub pair: TokenPair,
    pub trader: TraderAddr,
    pub bad_debt: Decimal,
}
