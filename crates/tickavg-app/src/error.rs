//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Invalid input: {0}")]
    Input(#[from] tickavg_core::CoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] tickavg_feed::FeedError),

    #[error("Query error: {0}")]
    Analytics(#[from] tickavg_analytics::AnalyticsError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tickavg_persistence::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tickavg_telemetry::TelemetryError),

    #[error("API error: {0}")]
    Api(#[from] tickavg_api::ApiError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
