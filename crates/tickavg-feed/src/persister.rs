//! Hands collected batches to storage.

use crate::batch::Batch;
use tickavg_persistence::DynStorage;
use tickavg_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Totals of one persister run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub batches: u64,
    pub records: u64,
    pub failures: u64,
}

/// Appends batches to storage. Failures are logged and counted; they never
/// stop the collection feeding it.
#[derive(Clone)]
pub struct BatchPersister {
    storage: DynStorage,
}

impl BatchPersister {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Append one batch. Returns `false` if storage rejected it.
    pub async fn persist(&self, batch: &Batch) -> bool {
        if batch.is_empty() {
            return true;
        }
        match self.storage.append_batch(batch.records()).await {
            Ok(()) => {
                Metrics::records_persisted(batch.len());
                debug!(records = batch.len(), "Batch persisted");
                true
            }
            Err(e) => {
                Metrics::storage_append_failed();
                error!(error = %e, records = batch.len(), "Failed to persist batch");
                false
            }
        }
    }

    /// Drain `rx` until every sender is gone.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<Batch>) -> JoinHandle<PersistStats> {
        tokio::spawn(async move {
            let mut stats = PersistStats::default();
            while let Some(batch) = rx.recv().await {
                self.record(&mut stats, &batch).await;
            }
            stats
        })
    }

    pub(crate) async fn record(&self, stats: &mut PersistStats, batch: &Batch) {
        if batch.is_empty() {
            return;
        }
        stats.batches += 1;
        if self.persist(batch).await {
            stats.records += batch.len() as u64;
        } else {
            stats.failures += 1;
        }
    }
}
