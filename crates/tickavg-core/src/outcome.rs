//! Tagged query results.
//!
//! "No data" and "insufficient" are distinct outcomes, and neither is an
//! error nor a zero.

use crate::Price;

/// Result of a single SMA window update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaStep {
    /// Enough in-window points: current moving average.
    Average(Price),
    /// Fewer in-window points than the configured count.
    Insufficient,
}

impl SmaStep {
    pub fn average(&self) -> Option<Price> {
        match self {
            Self::Average(p) => Some(*p),
            Self::Insufficient => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::Insufficient)
    }
}

/// Terminal answer of an average or SMA query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Computed price.
    Value(Price),
    /// Records exist, but not enough of them inside the SMA window.
    Insufficient,
    /// The matching record set was empty.
    NoData,
}

impl QueryOutcome {
    pub fn value(&self) -> Option<Price> {
        match self {
            Self::Value(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Short label used in logs, metrics and API responses.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Value(_) => "ok",
            Self::Insufficient => "insufficient",
            Self::NoData => "no_data",
        }
    }
}

impl From<SmaStep> for QueryOutcome {
    fn from(step: SmaStep) -> Self {
        match step {
            SmaStep::Average(p) => Self::Value(p),
            SmaStep::Insufficient => Self::Insufficient,
        }
    }
}

impl std::fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(p) => write!(f, "{p}"),
            Self::Insufficient => write!(f, "insufficient"),
            Self::NoData => write!(f, "null"),
        }
    }
}
