//! Prometheus metrics for tickavg.
//!
//! Covers:
//! - Tick ingestion and batching
//! - Subscription failures and connection notifications
//! - Storage append failures
//! - Query outcomes
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on duplicate
//! metric names, which is a programming error caught at first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

/// Ticks accepted into a batch.
pub static TICKS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_ticks_received_total",
        "Ticks appended to a collection batch",
        &["symbol"]
    )
    .unwrap()
});

/// Ticks dropped before reaching a batch.
/// Labels: reason (invalid_price/stopped)
pub static TICKS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_ticks_dropped_total",
        "Ticks dropped before reaching a batch",
        &["reason"]
    )
    .unwrap()
});

/// Batch threshold signals fired.
pub static BATCH_THRESHOLD_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickavg_batch_threshold_total",
        "Times a collection reached its batch size threshold"
    )
    .unwrap()
});

/// Records written to storage.
pub static RECORDS_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickavg_records_persisted_total",
        "Trade records appended to storage"
    )
    .unwrap()
});

/// Failed storage appends.
pub static STORAGE_APPEND_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickavg_storage_append_failures_total",
        "Batch appends that failed"
    )
    .unwrap()
});

/// Rejected subscribe requests.
pub static SUBSCRIPTION_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_subscription_failures_total",
        "Subscribe requests rejected by the event source",
        &["symbol"]
    )
    .unwrap()
});

/// Currently active subscriptions.
pub static ACTIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tickavg_active_subscriptions",
        "Subscriptions currently held by running collections"
    )
    .unwrap()
});

/// Connection notifications.
/// Labels: symbol, event (lost/restored)
pub static CONNECTION_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_connection_events_total",
        "Connection lost / restored notifications",
        &["symbol", "event"]
    )
    .unwrap()
});

/// Transport reconnection attempts.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_ws_reconnect_total",
        "WebSocket reconnection attempts",
        &["symbol"]
    )
    .unwrap()
});

/// Query outcomes.
/// Labels: kind (period_average/sma), outcome (ok/insufficient/no_data/invalid/error)
pub static QUERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickavg_queries_total",
        "Average and SMA queries by outcome",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Metrics facade.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    pub fn tick_received(symbol: &str) {
        TICKS_RECEIVED_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn tick_dropped(reason: &str) {
        TICKS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn batch_threshold_reached() {
        BATCH_THRESHOLD_TOTAL.inc();
    }

    pub fn records_persisted(count: usize) {
        RECORDS_PERSISTED_TOTAL.inc_by(count as u64);
    }

    pub fn storage_append_failed() {
        STORAGE_APPEND_FAILURES_TOTAL.inc();
    }

    pub fn subscription_failed(symbol: &str) {
        SUBSCRIPTION_FAILURES_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn subscriptions_opened(count: usize) {
        ACTIVE_SUBSCRIPTIONS.add(count as i64);
    }

    pub fn subscriptions_closed(count: usize) {
        ACTIVE_SUBSCRIPTIONS.sub(count as i64);
    }

    pub fn connection_event(symbol: &str, event: &str) {
        CONNECTION_EVENTS_TOTAL
            .with_label_values(&[symbol, event])
            .inc();
    }

    pub fn ws_reconnect(symbol: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn query(kind: &str, outcome: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, outcome]).inc();
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_facade_records() {
        let before = TICKS_RECEIVED_TOTAL.with_label_values(&["TESTUSDT"]).get();
        Metrics::tick_received("TESTUSDT");
        let after = TICKS_RECEIVED_TOTAL.with_label_values(&["TESTUSDT"]).get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_gather_text_contains_registered_metric() {
        Metrics::query("sma", "no_data");
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("tickavg_queries_total"));
    }
}
