//! Analytics error types.

use thiserror::Error;
use tickavg_core::CoreError;
use tickavg_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The running sum left the representable `Decimal` range.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("Storage error: {0}")]
    Storage(#[from] PersistenceError),
}

impl From<CoreError> for AnalyticsError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            other => Self::InvalidParameter(other.to_string()),
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
