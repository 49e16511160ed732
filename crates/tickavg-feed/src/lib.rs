//! Trade ingestion for tickavg.
//!
//! Turns a live per-symbol event feed into batches of validated trade
//! records:
//! - `IngestionCollector` / `Collection`: subscriptions, batching, threshold
//!   signal, flush and stop
//! - `BatchPersister`: hands batches to storage
//! - `IngestionService`: collections started from the API or CLI

pub mod batch;
pub mod collector;
pub mod error;
pub mod persister;
pub mod service;

pub use batch::Batch;
pub use collector::{
    Collection, CollectionStats, FlushPolicy, IngestionCollector, SubscribeReport,
    DEFAULT_BATCH_SIZE,
};
pub use error::{FeedError, FeedResult};
pub use persister::{BatchPersister, PersistStats};
pub use service::IngestionService;
