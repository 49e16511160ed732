//! Storage-backed price queries.

use crate::average::period_average;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::window::SlidingWindowAggregator;
use chrono::{DateTime, Duration, Utc};
use tickavg_core::{PeriodCode, QueryOutcome, SmaStep};
use tickavg_persistence::{DynStorage, RecordQuery};
use tickavg_telemetry::Metrics;
use tracing::debug;

/// Answers average and SMA queries from persisted records.
///
/// Stateless apart from the injected storage; every SMA query builds its own
/// aggregator.
#[derive(Clone)]
pub struct PriceQueryService {
    storage: DynStorage,
}

impl PriceQueryService {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Mean price of `symbol` over `[from, to]`, both inclusive.
    pub async fn get_period_average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AnalyticsResult<QueryOutcome> {
        if from > to {
            Metrics::query("period_average", "invalid");
            return Err(AnalyticsError::InvalidParameter(format!(
                "range start {from} is after range end {to}"
            )));
        }

        let records = self
            .storage
            .query(RecordQuery::new(symbol).between(from, to))
            .await?;
        let outcome = match period_average(&records) {
            Ok(outcome) => outcome,
            Err(e) => {
                Metrics::query("period_average", "error");
                return Err(e);
            }
        };

        debug!(
            symbol,
            %from,
            %to,
            records = records.len(),
            outcome = %outcome,
            "Period average computed"
        );
        Metrics::query("period_average", outcome.status());
        Ok(outcome)
    }

    /// Mean price of `symbol` over the 24 hours ending now.
    pub async fn get_24h_average(&self, symbol: &str) -> AnalyticsResult<QueryOutcome> {
        self.get_24h_average_at(symbol, Utc::now()).await
    }

    /// Mean price of `symbol` over the 24 hours ending at `now`.
    pub async fn get_24h_average_at(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<QueryOutcome> {
        self.get_period_average(symbol, now - Duration::hours(24), now)
            .await
    }

    /// SMA over the latest `n` records of `symbol`, bounded by `period_code`.
    ///
    /// With `start`, only records at or before it are considered. The records
    /// are replayed oldest first; the last step is the answer.
    pub async fn get_simple_moving_average(
        &self,
        symbol: &str,
        n: usize,
        period_code: &str,
        start: Option<DateTime<Utc>>,
    ) -> AnalyticsResult<QueryOutcome> {
        let prepared = period_code
            .parse::<PeriodCode>()
            .map_err(AnalyticsError::from)
            .and_then(|code| Ok((code, SlidingWindowAggregator::new(code.minutes(), n)?)));
        let (code, mut aggregator) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                Metrics::query("sma", "invalid");
                return Err(e);
            }
        };

        let mut query = RecordQuery::new(symbol).latest(n);
        if let Some(start) = start {
            query = query.at_or_before(start);
        }
        let records = self.storage.query(query).await?;

        let mut last = None;
        for record in &records {
            match aggregator.add_data_point(record.event_time(), record.price()) {
                Ok(step) => last = Some(step),
                Err(e) => {
                    Metrics::query("sma", "error");
                    return Err(e);
                }
            }
        }
        let outcome = match last {
            None => QueryOutcome::NoData,
            Some(SmaStep::Average(avg)) => QueryOutcome::Value(avg),
            Some(SmaStep::Insufficient) => QueryOutcome::Insufficient,
        };

        debug!(
            symbol,
            n,
            period = %code,
            start = ?start,
            records = records.len(),
            outcome = %outcome,
            "Simple moving average computed"
        );
        Metrics::query("sma", outcome.status());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tickavg_core::{Price, TradeRecord};
    use tickavg_persistence::{MemoryStorage, Storage};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn record(price: Decimal, at: DateTime<Utc>) -> TradeRecord {
        TradeRecord::new("BTCUSDT", Price::new(price), at).unwrap()
    }

    async fn service_with(records: Vec<TradeRecord>) -> PriceQueryService {
        let storage = Arc::new(MemoryStorage::new());
        storage.append_batch(&records).await.unwrap();
        PriceQueryService::new(storage)
    }

    async fn sma_fixture() -> PriceQueryService {
        service_with(vec![
            record(dec!(100), t0()),
            record(dec!(102), t0() + Duration::minutes(1)),
            record(dec!(98), t0() + Duration::minutes(2)),
        ])
        .await
    }

    #[tokio::test]
    async fn test_period_average_over_day() {
        let service = service_with(vec![
            record(dec!(10), t0() + Duration::hours(1)),
            record(dec!(20), t0() + Duration::hours(2)),
            record(dec!(30), t0() + Duration::hours(3)),
        ])
        .await;

        let out = service
            .get_period_average("BTCUSDT", t0(), t0() + Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Value(Price::new(dec!(20))));
    }

    #[tokio::test]
    async fn test_period_average_empty_is_no_data() {
        let service = service_with(vec![record(dec!(10), t0())]).await;
        let out = service
            .get_period_average("ETHUSDT", t0(), t0() + Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::NoData);
    }

    #[tokio::test]
    async fn test_period_average_inverted_range() {
        let service = service_with(vec![]).await;
        let err = service
            .get_period_average("BTCUSDT", t0() + Duration::hours(1), t0())
            .await;
        assert!(matches!(err, Err(AnalyticsError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_24h_average_excludes_older_records() {
        let now = t0() + Duration::hours(30);
        let service = service_with(vec![
            record(dec!(1000), t0()),
            record(dec!(10), now - Duration::hours(2)),
            record(dec!(30), now),
        ])
        .await;

        let out = service.get_24h_average_at("BTCUSDT", now).await.unwrap();
        assert_eq!(out, QueryOutcome::Value(Price::new(dec!(20))));
    }

    #[tokio::test]
    async fn test_sma_with_wide_period() {
        let service = sma_fixture().await;
        let out = service
            .get_simple_moving_average("BTCUSDT", 3, "30m", None)
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Value(Price::new(dec!(100))));
    }

    #[tokio::test]
    async fn test_sma_one_minute_period_is_insufficient() {
        let service = sma_fixture().await;
        let out = service
            .get_simple_moving_average("BTCUSDT", 3, "1m", None)
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Insufficient);
    }

    #[tokio::test]
    async fn test_sma_start_limits_records() {
        let service = sma_fixture().await;
        let out = service
            .get_simple_moving_average("BTCUSDT", 2, "5m", Some(t0() + Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Value(Price::new(dec!(101))));
    }

    #[tokio::test]
    async fn test_sma_no_records_is_no_data() {
        let service = service_with(vec![]).await;
        let out = tokio_test::assert_ok!(
            service
                .get_simple_moving_average("BTCUSDT", 3, "1d", None)
                .await
        );
        assert_eq!(out, QueryOutcome::NoData);
    }

    #[tokio::test]
    async fn test_sma_fewer_records_than_n() {
        let service = service_with(vec![record(dec!(5), t0())]).await;
        let out = service
            .get_simple_moving_average("BTCUSDT", 3, "1w", None)
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Insufficient);
    }

    #[tokio::test]
    async fn test_sma_rejects_bad_parameters() {
        let service = sma_fixture().await;
        let bad_code = service
            .get_simple_moving_average("BTCUSDT", 3, "2h", None)
            .await;
        assert!(matches!(bad_code, Err(AnalyticsError::InvalidParameter(_))));

        let zero_n = service
            .get_simple_moving_average("BTCUSDT", 0, "1m", None)
            .await;
        assert!(matches!(zero_n, Err(AnalyticsError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_sma_huge_n_is_insufficient() {
        let service = sma_fixture().await;
        let out = service
            .get_simple_moving_average("BTCUSDT", usize::MAX, "1m", None)
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::Insufficient);

        let empty = service_with(vec![]).await;
        let out = empty
            .get_simple_moving_average("BTCUSDT", usize::MAX, "1w", None)
            .await
            .unwrap();
        assert_eq!(out, QueryOutcome::NoData);
    }

    #[tokio::test]
    async fn test_overflowing_prices_are_an_error() {
        let service = service_with(vec![
            record(Decimal::MAX, t0()),
            record(Decimal::MAX, t0() + Duration::minutes(1)),
        ])
        .await;

        let avg = service
            .get_period_average("BTCUSDT", t0(), t0() + Duration::hours(1))
            .await;
        assert!(matches!(avg, Err(AnalyticsError::Overflow(_))));

        let sma = service
            .get_simple_moving_average("BTCUSDT", 2, "5m", None)
            .await;
        assert!(matches!(sma, Err(AnalyticsError::Overflow(_))));
    }
}
