//! tickavg application.
//!
//! Wires the Binance trade source, the ingestion pipeline, the storage
//! backend, the query service and the HTTP API according to [`AppConfig`].

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, CollectConfig, StorageBackend, StorageConfig};
pub use error::{AppError, AppResult};
