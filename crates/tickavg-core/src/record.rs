//! Trade tick and trade record types.

use crate::error::{CoreError, Result};
use crate::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single trade event as pushed by an upstream feed.
///
/// Not validated: the feed is untrusted and may deliver a zero price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub symbol: String,
    pub price: Price,
    pub event_time: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: Price, event_time: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            event_time,
        }
    }
}

/// Persisted trade record.
///
/// Immutable once created; `price > 0` is guaranteed by construction,
/// including when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTradeRecord")]
pub struct TradeRecord {
    symbol: String,
    price: Price,
    event_time: DateTime<Utc>,
}

impl TradeRecord {
    /// Create a record, rejecting non-positive prices and empty symbols.
    pub fn new(symbol: impl Into<String>, price: Price, event_time: DateTime<Utc>) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(CoreError::InvalidParameter("empty symbol".to_string()));
        }
        if !price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "{symbol}: price must be positive, got {price}"
            )));
        }
        Ok(Self {
            symbol,
            price,
            event_time,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }
}

/// Unchecked wire form of [`TradeRecord`].
#[derive(Deserialize)]
struct RawTradeRecord {
    symbol: String,
    price: Price,
    event_time: DateTime<Utc>,
}

impl TryFrom<RawTradeRecord> for TradeRecord {
    type Error = CoreError;

    fn try_from(raw: RawTradeRecord) -> Result<Self> {
        Self::new(raw.symbol, raw.price, raw.event_time)
    }
}

impl TryFrom<Tick> for TradeRecord {
    type Error = CoreError;

    fn try_from(tick: Tick) -> Result<Self> {
        Self::new(tick.symbol, tick.price, tick.event_time)
    }
}
