//! Feed error types.

use thiserror::Error;
use tickavg_core::SubscriptionError;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error("Collection writer is no longer running")]
    CollectionClosed,
}

pub type FeedResult<T> = Result<T, FeedError>;
