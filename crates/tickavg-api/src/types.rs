//! Request and response bodies.

use serde::{Deserialize, Serialize};
use tickavg_core::QueryOutcome;
use tickavg_feed::SubscribeReport;

/// Answer of an average or SMA query.
///
/// `value` is a decimal string, or null unless `status` is `ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub status: String,
    pub value: Option<String>,
}

impl PriceResponse {
    pub fn new(symbol: impl Into<String>, outcome: QueryOutcome) -> Self {
        Self {
            symbol: symbol.into(),
            status: outcome.status().to_string(),
            value: outcome.value().map(|p| p.to_string()),
        }
    }
}

/// Query string of the SMA endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SmaParams {
    /// Number of data points.
    pub n: usize,
    /// Period code (1w, 1d, 30m, 5m, 1m).
    pub p: String,
    /// Optional upper bound on record time.
    #[serde(default)]
    pub s: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectRequest {
    pub symbols: Vec<String>,
    #[serde(default, rename = "batchSize")]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectResponse {
    pub active: Vec<String>,
    pub failed: Vec<FailedSymbol>,
}

impl From<SubscribeReport> for CollectResponse {
    fn from(report: SubscribeReport) -> Self {
        Self {
            active: report.active,
            failed: report
                .failed
                .into_iter()
                .map(|e| FailedSymbol {
                    symbol: e.symbol,
                    reason: e.reason,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tickavg_core::Price;

    #[test]
    fn test_price_response_json() {
        let ok = PriceResponse::new("BTCUSDT", QueryOutcome::Value(Price::new(dec!(20))));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"symbol": "BTCUSDT", "status": "ok", "value": "20"})
        );

        let none = PriceResponse::new("BTCUSDT", QueryOutcome::NoData);
        assert_eq!(
            serde_json::to_value(&none).unwrap(),
            serde_json::json!({"symbol": "BTCUSDT", "status": "no_data", "value": null})
        );
    }

    #[test]
    fn test_collect_request_batch_size_is_optional() {
        let req: CollectRequest = serde_json::from_str(r#"{"symbols":["BTCUSDT"]}"#).unwrap();
        assert_eq!(req.batch_size, None);
        let req: CollectRequest =
            serde_json::from_str(r#"{"symbols":["BTCUSDT"],"batchSize":5}"#).unwrap();
        assert_eq!(req.batch_size, Some(5));
    }
}
