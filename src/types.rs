// 1.0: all the primitives live here. pairs, traders, directions, sizes, coins, timestamps.
// each is a newtype or a small enum so the compiler catches mixups between base and quote.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("invalid token pair {0:?}: expected \"base:quote\"")]
    MalformedPair(String),

    #[error("invalid denom {0:?}")]
    InvalidDenom(String),

    #[error("trader address must not be empty")]
    EmptyTrader,
}

fn validate_denom(denom: &str) -> Result<(), TypeError> {
    let mut chars = denom.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'));
    if starts_alpha && rest_ok && denom.len() <= 128 {
        Ok(())
    } else {
        Err(TypeError::InvalidDenom(denom.to_string()))
    }
}

/// Ordered (base, quote) denomination pair. The canonical form is `"base:quote"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenPair(String);

impl TokenPair {
    pub fn new(base: &str, quote: &str) -> Result<Self, TypeError> {
        validate_denom(base)?;
        validate_denom(quote)?;
        Ok(Self(format!("{base}:{quote}")))
    }

    pub fn base_denom(&self) -> &str {
        self.0.split_once(':').map(|(b, _)| b).unwrap_or_default()
    }

    pub fn quote_denom(&self) -> &str {
        self.0.split_once(':').map(|(_, q)| q).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        Self::from_str(&self.0).map(|_| ())
    }
}

impl FromStr for TokenPair {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Self::new(base, quote)
            }
            _ => Err(TypeError::MalformedPair(s.to_string())),
        }
    }
}

impl TryFrom<String> for TokenPair {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenPair> for String {
    fn from(pair: TokenPair) -> Self {
        pair.0
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraderAddr(String);

impl TraderAddr {
    pub fn new(addr: &str) -> Result<Self, TypeError> {
        if addr.trim().is_empty() {
            return Err(TypeError::EmptyTrader);
        }
        Ok(Self(addr.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TraderAddr {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TraderAddr> for String {
    fn from(addr: TraderAddr) -> Self {
        addr.0
    }
}

impl fmt::Display for TraderAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 1.1: sign convention for a reserve delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    AddToPool,
    RemoveFromPool,
}

// 1.2: which price definition a TWAP averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwapCalcOption {
    Spot,
    /// base amount moved by swapping a fixed quote amount
    QuoteAssetSwap,
    /// quote amount moved by swapping a fixed base amount
    BaseAssetSwap,
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    /// direction of the quote leg when opening on this side
    pub fn open_direction(&self) -> Direction {
        match self {
            Side::Long => Direction::AddToPool,
            Side::Short => Direction::RemoveFromPool,
        }
    }
}

// 1.3: signed size: positive = long, negative = short. core to all position math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSize(Decimal);

impl SignedSize {
    pub fn new(size: Decimal) -> Self {
        Self(size)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_side(side: Side, abs_size: Decimal) -> Self {
        Self(side.sign() * abs_size.abs())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Decimal {
        self.0.abs()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn side(&self) -> Option<Side> {
        if self.is_long() {
            Some(Side::Long)
        } else if self.is_short() {
            Some(Side::Short)
        } else {
            None
        }
    }

    pub fn add(&self, delta: Decimal) -> Self {
        Self(self.0 + delta)
    }

    /// direction of the base leg when closing: longs sell base into the pool
    pub fn close_direction(&self) -> Direction {
        if self.is_short() {
            Direction::RemoveFromPool
        } else {
            Direction::AddToPool
        }
    }
}

impl fmt::Display for SignedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: leverage multiplier. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: an amount of one denomination moved through the collateral bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Decimal,
}

impl Coin {
    pub fn new(denom: &str, amount: Decimal) -> Self {
        Self {
            denom: denom.to_string(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

// 1.6: millisecond timestamp. always supplied by the block, never read from a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn saturating_sub(&self, window: chrono::Duration) -> Self {
        Self(self.0.saturating_sub(window.num_milliseconds()))
    }

    pub fn saturating_add(&self, window: chrono::Duration) -> Self {
        Self(self.0.saturating_add(window.num_milliseconds()))
    }

    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}ms", self.0),
        }
    }
}
