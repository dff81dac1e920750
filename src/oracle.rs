// 6.0 oracle.rs: index price source. the engine only sees the PriceOracle trait;
// how prices get posted and aggregated upstream is not its concern.

use crate::types::{Timestamp, TokenPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no price posted for {base}:{quote}")]
    NoPrice { base: String, quote: String },

    #[error("posted price for {base}:{quote} expired at {expiry}")]
    Expired {
        base: String,
        quote: String,
        expiry: Timestamp,
    },

    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

pub trait PriceOracle {
    fn get_current_price(&self, base: &str, quote: &str) -> Result<Decimal, OracleError>;

    fn price_for_pair(&self, pair: &TokenPair) -> Result<Decimal, OracleError> {
        self.get_current_price(pair.base_denom(), pair.quote_denom())
    }
}

/** 6.1: last posted price per pair, valid until its expiry */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedPrice {
    pub price: Decimal,
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct PostedPriceOracle {
    prices: HashMap<(String, String), PostedPrice>,
    // block time the oracle checks expiry against
    now: Timestamp,
}

impl PostedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_price(
        &mut self,
        pair: &TokenPair,
        price: Decimal,
        expiry: Timestamp,
    ) -> Result<(), OracleError> {
        if price <= Decimal::ZERO {
            return Err(OracleError::NonPositivePrice(price));
        }
        self.prices.insert(
            (pair.base_denom().to_string(), pair.quote_denom().to_string()),
            PostedPrice { price, expiry },
        );
        Ok(())
    }

    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }
}

impl PriceOracle for PostedPriceOracle {
    fn get_current_price(&self, base: &str, quote: &str) -> Result<Decimal, OracleError> {
        let posted = self
            .prices
            .get(&(base.to_string(), quote.to_string()))
            .ok_or_else(|| OracleError::NoPrice {
                base: base.to_string(),
                quote: quote.to_string(),
            })?;
        if posted.expiry < self.now {
            return Err(OracleError::Expired {
                base: base.to_string(),
                quote: quote.to_string(),
                expiry: posted.expiry,
            });
        }
        Ok(posted.price)
    }
}

// MOCKED. fixed prices, call counting, failure injection
#[derive(Debug, Default)]
pub struct MockOracle {
    prices: HashMap<String, Decimal>,
    failure: Option<OracleError>,
    calls: Cell<usize>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, pair: &TokenPair, price: Decimal) -> Self {
        self.set_price(pair, price);
        self
    }

    pub fn set_price(&mut self, pair: &TokenPair, price: Decimal) {
        self.prices.insert(pair.to_string(), price);
    }

    /// every call fails with `err` until cleared
    pub fn fail_with(&mut self, err: OracleError) {
        self.failure = Some(err);
    }

    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PriceOracle for MockOracle {
    fn get_current_price(&self, base: &str, quote: &str) -> Result<Decimal, OracleError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.prices
            .get(&format!("{base}:{quote}"))
            .copied()
            .ok_or_else(|| OracleError::NoPrice {
                base: base.to_string(),
                quote: quote.to_string(),
            })
    }
}
