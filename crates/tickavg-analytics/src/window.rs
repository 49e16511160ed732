//! Sliding-window simple moving average.
//!
//! The window is bounded two ways at once:
//! - by time: a point older than `period` relative to the most recently
//!   added timestamp is evicted
//! - by count: an average is produced only once `number_of_data_points`
//!   points are in the window
//!
//! The average divides by the configured point count, not by the current
//! window length. With more in-window points than the count (possible when
//! points arrive faster than the period), the result is `sum / count`.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tickavg_core::{Price, SmaStep};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Upper bound on the points reserved up front for a new window.
const MAX_WINDOW_PREALLOC: usize = 1024;

/// Stateful SMA engine owned by a single query.
#[derive(Debug)]
pub struct SlidingWindowAggregator {
    period: Duration,
    number_of_data_points: usize,
    window: VecDeque<(DateTime<Utc>, Price)>,
    sum: Price,
}

impl SlidingWindowAggregator {
    /// Both `period_minutes` and `number_of_data_points` must be positive.
    pub fn new(period_minutes: u32, number_of_data_points: usize) -> AnalyticsResult<Self> {
        if period_minutes == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "period must be at least one minute".to_string(),
            ));
        }
        if number_of_data_points == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "number of data points must be positive".to_string(),
            ));
        }
        Ok(Self {
            period: Duration::minutes(i64::from(period_minutes)),
            number_of_data_points,
            window: VecDeque::with_capacity(number_of_data_points.min(MAX_WINDOW_PREALLOC)),
            sum: Price::ZERO,
        })
    }

    /// Add a point and return the current moving average, if any.
    ///
    /// Out-of-order points are accepted; one older than the front of the
    /// window never evicts anything. A point that would overflow the running
    /// sum is rejected and not added; evictions it caused still apply.
    pub fn add_data_point(
        &mut self,
        timestamp: DateTime<Utc>,
        price: Price,
    ) -> AnalyticsResult<SmaStep> {
        // Eviction only depends on the new timestamp, so it can run first.
        while let Some(&(front_ts, front_price)) = self.window.front() {
            if timestamp - front_ts <= self.period {
                break;
            }
            self.window.pop_front();
            // Subtracting a previously added point stays in range.
            self.sum = self.sum.checked_sub(front_price).unwrap_or(Price::ZERO);
        }

        self.sum = self.sum.checked_add(price).ok_or_else(|| {
            AnalyticsError::Overflow(format!(
                "adding {price} to a window sum of {}",
                self.sum
            ))
        })?;
        self.window.push_back((timestamp, price));

        if self.window.len() < self.number_of_data_points {
            return Ok(SmaStep::Insufficient);
        }
        Ok(match Price::average_of(self.sum, self.number_of_data_points) {
            Some(avg) => SmaStep::Average(avg),
            None => SmaStep::Insufficient,
        })
    }

    /// Points currently inside the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn sum(&self) -> Price {
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn p(v: Decimal) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_rejects_zero_parameters() {
        assert!(matches!(
            SlidingWindowAggregator::new(0, 3),
            Err(AnalyticsError::InvalidParameter(_))
        ));
        assert!(matches!(
            SlidingWindowAggregator::new(1, 0),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_insufficient_until_count_reached() {
        let mut agg = SlidingWindowAggregator::new(10, 3).unwrap();
        assert_eq!(agg.add_data_point(t(0), p(dec!(100))).unwrap(), SmaStep::Insufficient);
        assert_eq!(agg.add_data_point(t(1), p(dec!(102))).unwrap(), SmaStep::Insufficient);
        assert_eq!(
            agg.add_data_point(t(2), p(dec!(98))).unwrap(),
            SmaStep::Average(p(dec!(100)))
        );
    }

    #[test]
    fn test_time_eviction_causes_insufficient() {
        let mut agg = SlidingWindowAggregator::new(1, 3).unwrap();
        agg.add_data_point(t(0), p(dec!(100))).unwrap();
        agg.add_data_point(t(1), p(dec!(102))).unwrap();
        // t0 is two minutes older than t2 and leaves the window.
        assert_eq!(agg.add_data_point(t(2), p(dec!(98))).unwrap(), SmaStep::Insufficient);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.sum(), p(dec!(200)));
    }

    #[test]
    fn test_point_exactly_period_old_is_kept() {
        let mut agg = SlidingWindowAggregator::new(1, 2).unwrap();
        agg.add_data_point(t(0), p(dec!(10))).unwrap();
        assert_eq!(
            agg.add_data_point(t(1), p(dec!(20))).unwrap(),
            SmaStep::Average(p(dec!(15)))
        );
    }

    #[test]
    fn test_divides_by_configured_count() {
        let mut agg = SlidingWindowAggregator::new(60, 2).unwrap();
        agg.add_data_point(t(0), p(dec!(10))).unwrap();
        agg.add_data_point(t(1), p(dec!(20))).unwrap();
        // Three in-window points, configured count two.
        assert_eq!(
            agg.add_data_point(t(2), p(dec!(30))).unwrap(),
            SmaStep::Average(p(dec!(30)))
        );
    }

    #[test]
    fn test_out_of_order_point_does_not_evict() {
        let mut agg = SlidingWindowAggregator::new(5, 3).unwrap();
        agg.add_data_point(t(10), p(dec!(1))).unwrap();
        agg.add_data_point(t(11), p(dec!(2))).unwrap();
        // Older than the front: difference is negative, nothing leaves.
        let step = agg.add_data_point(t(0), p(dec!(3))).unwrap();
        assert_eq!(agg.len(), 3);
        assert_eq!(step, SmaStep::Average(p(dec!(2))));
    }

    #[test]
    fn test_evicted_point_no_longer_contributes() {
        let mut agg = SlidingWindowAggregator::new(5, 1).unwrap();
        agg.add_data_point(t(0), p(dec!(1000))).unwrap();
        assert_eq!(
            agg.add_data_point(t(6), p(dec!(1))).unwrap(),
            SmaStep::Average(p(dec!(1)))
        );
        assert_eq!(agg.sum(), p(dec!(1)));
    }

    #[test]
    fn test_average_is_rounded_half_even() {
        let mut agg = SlidingWindowAggregator::new(10, 3).unwrap();
        agg.add_data_point(t(0), p(dec!(1))).unwrap();
        agg.add_data_point(t(1), p(dec!(0))).unwrap();
        let step = agg.add_data_point(t(2), p(dec!(0))).unwrap();
        assert_eq!(step, SmaStep::Average(p(dec!(0.333333333333))));
    }

    #[test]
    fn test_huge_count_starts_empty() {
        let mut agg = SlidingWindowAggregator::new(1, usize::MAX).unwrap();
        assert!(agg.is_empty());
        assert_eq!(
            agg.add_data_point(t(0), p(dec!(5))).unwrap(),
            SmaStep::Insufficient
        );
    }

    #[test]
    fn test_overflowing_point_is_rejected() {
        let mut agg = SlidingWindowAggregator::new(10, 2).unwrap();
        agg.add_data_point(t(0), p(Decimal::MAX)).unwrap();
        let err = agg.add_data_point(t(1), p(Decimal::MAX));
        assert!(matches!(err, Err(AnalyticsError::Overflow(_))));
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.sum(), p(Decimal::MAX));
    }

    #[test]
    fn test_eviction_frees_room_for_large_points() {
        let mut agg = SlidingWindowAggregator::new(1, 1).unwrap();
        agg.add_data_point(t(0), p(Decimal::MAX)).unwrap();
        assert_eq!(
            agg.add_data_point(t(5), p(Decimal::MAX)).unwrap(),
            SmaStep::Average(p(Decimal::MAX))
        );
        assert_eq!(agg.len(), 1);
    }
}
