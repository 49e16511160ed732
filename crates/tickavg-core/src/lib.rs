//! Core domain types for tickavg.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`: Precision-safe decimal price with the averaging rounding rule
//! - `Tick`, `TradeRecord`: Upstream trade event and its validated, persisted form
//! - `PeriodCode`: SMA period codes (1w, 1d, 30m, 5m, 1m)
//! - `QueryOutcome`, `SmaStep`: Tagged query results (value / insufficient / no data)
//! - `EventSource`: Collaborator trait for per-symbol trade feeds
//! - `ManualEventSource`: Caller-driven feed for replays and tests
//! - `parse_timestamp`: Query bound parsing (RFC 3339 or naive UTC)

pub mod decimal;
pub mod error;
pub mod manual;
pub mod outcome;
pub mod period;
pub mod record;
pub mod source;
pub mod time;

pub use decimal::{Price, AVERAGE_DECIMAL_PLACES};
pub use error::{CoreError, Result};
pub use manual::ManualEventSource;
pub use outcome::{QueryOutcome, SmaStep};
pub use period::PeriodCode;
pub use record::{Tick, TradeRecord};
pub use source::{
    DynEventSource, EventSource, LinkStatus, SubscriptionError, SubscriptionHandle, TickSink,
};
pub use time::parse_timestamp;
