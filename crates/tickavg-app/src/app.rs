//! Application orchestration.
//!
//! Builds the storage backend and trade source from [`AppConfig`] and runs
//! one of the CLI modes:
//! - HTTP API server (optionally auto-collecting the configured symbols)
//! - foreground collection until shutdown
//! - one-shot 24h average and SMA queries

use crate::config::{AppConfig, StorageBackend};
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tickavg_analytics::PriceQueryService;
use tickavg_api::{run_server, AppState};
use tickavg_core::{parse_timestamp, DynEventSource, QueryOutcome};
use tickavg_feed::{IngestionService, SubscribeReport};
use tickavg_persistence::{DynStorage, JsonLinesStorage, MemoryStorage};
use tickavg_ws::BinanceTradeSource;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Progress log interval while collecting in the foreground.
const COLLECT_STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Main application.
pub struct Application {
    config: AppConfig,
    source: DynEventSource,
    storage: DynStorage,
}

impl Application {
    /// Create the application with the configured source and storage.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let storage: DynStorage = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Jsonl => {
                Arc::new(JsonLinesStorage::open(config.storage.data_dir.clone())?)
            }
        };
        let source: DynEventSource = Arc::new(BinanceTradeSource::new(config.source.clone()));
        info!(
            backend = ?config.storage.backend,
            data_dir = %config.storage.data_dir.display(),
            url = %config.source.url,
            "Application initialized"
        );
        Ok(Self::with_parts(config, source, storage))
    }

    /// Create the application around an existing source and storage.
    pub fn with_parts(config: AppConfig, source: DynEventSource, storage: DynStorage) -> Self {
        Self {
            config,
            source,
            storage,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &DynStorage {
        &self.storage
    }

    fn queries(&self) -> PriceQueryService {
        PriceQueryService::new(self.storage.clone())
    }

    fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.source.clone(), self.storage.clone())
    }

    /// Serve the HTTP API until `shutdown` is cancelled.
    ///
    /// Collections still running at shutdown are stopped and their remaining
    /// records persisted.
    pub async fn serve(&self, shutdown: CancellationToken) -> AppResult<()> {
        let ingestion = Arc::new(self.ingestion());

        if self.config.collect.auto_start {
            let report = ingestion
                .start(&self.config.collect.symbols, self.config.collect.batch_size)
                .await?;
            log_report(&report);
        }

        let state = AppState::new(self.queries(), ingestion.clone(), self.config.api.clone());
        let served = run_server(state, self.config.api.clone(), shutdown).await;

        let stopped = ingestion.stop_all().await;
        info!(stopped, "Collections stopped on shutdown");
        served.map_err(AppError::from)
    }

    /// Collect `symbols` in the foreground until `shutdown` is cancelled.
    ///
    /// Returns the subscribe report of the collection.
    pub async fn collect(
        &self,
        symbols: &[String],
        batch_size: usize,
        shutdown: CancellationToken,
    ) -> AppResult<SubscribeReport> {
        let ingestion = self.ingestion();
        let report = ingestion.start(symbols, batch_size).await?;
        log_report(&report);

        let mut status = tokio::time::interval(COLLECT_STATUS_INTERVAL);
        status.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = status.tick() => {
                    info!(active = ?report.active, "Collection running");
                }
            }
        }

        let stopped = ingestion.stop_all().await;
        info!(stopped, "Collection stopped");
        Ok(report)
    }

    /// Mean price of `symbol` over the last 24 hours.
    pub async fn average_24h(&self, symbol: &str) -> AppResult<QueryOutcome> {
        Ok(self.queries().get_24h_average(symbol).await?)
    }

    /// SMA of `symbol`; `start` accepts RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC).
    pub async fn simple_moving_average(
        &self,
        symbol: &str,
        n: usize,
        period_code: &str,
        start: Option<&str>,
    ) -> AppResult<QueryOutcome> {
        let start = start.map(parse_timestamp).transpose()?;
        Ok(self
            .queries()
            .get_simple_moving_average(symbol, n, period_code, start)
            .await?)
    }
}

fn log_report(report: &SubscribeReport) {
    info!(active = ?report.active, "Collection started");
    for failure in &report.failed {
        warn!(symbol = %failure.symbol, reason = %failure.reason, "Symbol not collected");
    }
}
