//! Long-running collections persisted to storage.

use crate::batch::Batch;
use crate::collector::{Collection, FlushPolicy, IngestionCollector, SubscribeReport};
use crate::error::FeedResult;
use crate::persister::{BatchPersister, PersistStats};
use parking_lot::Mutex;
use tickavg_core::DynEventSource;
use tickavg_persistence::DynStorage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Running {
    collection: Collection,
    persister: JoinHandle<PersistStats>,
}

/// Starts collections whose batches go straight to storage.
pub struct IngestionService {
    collector: IngestionCollector,
    persister: BatchPersister,
    running: Mutex<Vec<Running>>,
}

impl IngestionService {
    pub fn new(source: DynEventSource, storage: DynStorage) -> Self {
        Self {
            collector: IngestionCollector::new(source),
            persister: BatchPersister::new(storage),
            running: Mutex::new(Vec::new()),
        }
    }

    /// Start a collection under the synchronous policy.
    pub async fn start(&self, symbols: &[String], batch_size: usize) -> FeedResult<SubscribeReport> {
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let collection = self
            .collector
            .collect_with_policy(symbols, batch_size, FlushPolicy::Synchronous(sink_tx))
            .await?;
        let persister = self.persister.clone().spawn(sink_rx);
        let report = collection.report().clone();

        self.running.lock().push(Running {
            collection,
            persister,
        });
        Ok(report)
    }

    /// Number of running collections.
    pub fn running(&self) -> usize {
        self.running.lock().len()
    }

    /// Stop every collection and persist what is left of its batch.
    ///
    /// Returns the number of collections stopped.
    pub async fn stop_all(&self) -> usize {
        let running = std::mem::take(&mut *self.running.lock());
        let count = running.len();

        for Running {
            collection,
            persister,
        } in running
        {
            let id = collection.id();
            let remaining = match collection.stop().await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(collection = id, error = %e, "Collection did not stop cleanly");
                    Batch::new()
                }
            };
            // The writer dropped its sink on stop, so the persister finishes
            // once it has drained the queued batches.
            let mut stats = match persister.await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(collection = id, error = %e, "Persister task failed");
                    PersistStats::default()
                }
            };
            self.persister.record(&mut stats, &remaining).await;
            info!(
                collection = id,
                batches = stats.batches,
                records = stats.records,
                failures = stats.failures,
                "Collection persisted"
            );
        }
        count
    }
}
