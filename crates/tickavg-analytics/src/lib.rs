//! Price aggregation over persisted trade records.
//!
//! - `SlidingWindowAggregator`: count- and time-bounded simple moving average
//! - `period_average`: arithmetic mean of a record set
//! - `PriceQueryService`: storage-backed query surface

pub mod average;
pub mod error;
pub mod query;
pub mod window;

pub use average::period_average;
pub use error::{AnalyticsError, AnalyticsResult};
pub use query::PriceQueryService;
pub use window::SlidingWindowAggregator;
