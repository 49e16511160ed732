//! Binance stream message types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tickavg_core::{Price, Tick};

/// Live subscribe / unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl SubscribeRequest {
    /// Stream name for the trade stream of `symbol` (lowercase).
    pub fn trade_stream(symbol: &str) -> String {
        format!("{}@trade", symbol.to_ascii_lowercase())
    }

    pub fn subscribe(symbol: &str, id: u64) -> Self {
        Self {
            method: "SUBSCRIBE".to_string(),
            params: vec![Self::trade_stream(symbol)],
            id,
        }
    }

    pub fn unsubscribe(symbol: &str, id: u64) -> Self {
        Self {
            method: "UNSUBSCRIBE".to_string(),
            params: vec![Self::trade_stream(symbol)],
            id,
        }
    }
}

/// Trade event pushed on `<symbol>@trade`.
///
/// Only the fields used for aggregation are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time (ms since epoch).
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    /// Decimal string, e.g. "42000.12000000".
    #[serde(rename = "p")]
    pub price: Decimal,
}

impl TradeEvent {
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.event_time_ms)
    }

    /// Convert to a tick. `None` for non-trade events or an unrepresentable
    /// event time.
    pub fn to_tick(&self) -> Option<Tick> {
        if self.event_type != "trade" {
            return None;
        }
        Some(Tick::new(
            self.symbol.clone(),
            Price::new(self.price),
            self.event_time()?,
        ))
    }
}

/// Error body of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandError {
    pub code: i64,
    pub msg: String,
}

/// Reply to a SUBSCRIBE / UNSUBSCRIBE request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Any text frame received on a raw stream connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Trade(TradeEvent),
    Response(CommandResponse),
    Other(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscribe_request_wire_format() {
        let req = SubscribeRequest::subscribe("BTCUSDT", 7);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"method":"SUBSCRIBE","params":["btcusdt@trade"],"id":7}"#
        );
    }

    #[test]
    fn test_parse_trade_event() {
        let raw = r#"{
            "e": "trade",
            "E": 1700000000123,
            "s": "BTCUSDT",
            "t": 12345,
            "p": "42000.12000000",
            "q": "0.00100000",
            "T": 1700000000120,
            "m": true,
            "M": true
        }"#;

        let msg: StreamMessage = serde_json::from_str(raw).unwrap();
        let StreamMessage::Trade(event) = msg else {
            panic!("expected trade, got {msg:?}");
        };
        let tick = event.to_tick().unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price.inner(), dec!(42000.12));
        assert_eq!(tick.event_time.timestamp_millis(), 1700000000123);
    }

    #[test]
    fn test_parse_ack_and_error() {
        let ack: StreamMessage = serde_json::from_str(r#"{"result":null,"id":1}"#).unwrap();
        assert!(matches!(ack, StreamMessage::Response(ref r) if r.id == 1 && !r.is_error()));

        let err: StreamMessage =
            serde_json::from_str(r#"{"error":{"code":2,"msg":"Invalid request"},"id":3}"#)
                .unwrap();
        match err {
            StreamMessage::Response(r) => {
                assert_eq!(r.id, 3);
                assert_eq!(r.error.unwrap().msg, "Invalid request");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_message_is_other() {
        let msg: StreamMessage = serde_json::from_str(r#"{"e":"kline","k":{}}"#).unwrap();
        assert!(matches!(msg, StreamMessage::Other(_)));
    }

    #[test]
    fn test_non_trade_event_yields_no_tick() {
        let event = TradeEvent {
            event_type: "aggTrade".to_string(),
            event_time_ms: 0,
            symbol: "BTCUSDT".to_string(),
            price: dec!(1),
        };
        assert!(event.to_tick().is_none());
    }
}
