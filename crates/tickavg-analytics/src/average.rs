//! Arithmetic mean over a record set.

use crate::error::{AnalyticsError, AnalyticsResult};
use tickavg_core::{Price, QueryOutcome, TradeRecord};

/// Unweighted mean price of `records`, rounded like every other average.
///
/// An empty set is `NoData`, never zero.
pub fn period_average(records: &[TradeRecord]) -> AnalyticsResult<QueryOutcome> {
    let mut sum = Price::ZERO;
    for record in records {
        sum = sum.checked_add(record.price()).ok_or_else(|| {
            AnalyticsError::Overflow(format!(
                "sum of {} {} prices exceeds the decimal range",
                records.len(),
                record.symbol()
            ))
        })?;
    }
    Ok(match Price::average_of(sum, records.len()) {
        Some(avg) => QueryOutcome::Value(avg),
        None => QueryOutcome::NoData,
    })
}
