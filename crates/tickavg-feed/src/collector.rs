//! Per-symbol subscriptions feeding a single batch writer.
//!
//! Every subscription callback, connection notification, flush and stop goes
//! through one unbounded queue drained by a single writer task. The writer
//! owns the batch and the threshold counter, so appending a record and
//! bumping the counter is one step, and flush-and-reset is atomic with
//! respect to appends.

use crate::batch::Batch;
use crate::error::{FeedError, FeedResult};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tickavg_core::{
    DynEventSource, LinkStatus, SubscriptionError, SubscriptionHandle, Tick, TickSink,
    TradeRecord,
};
use tickavg_telemetry::Metrics;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Batch size used when the caller does not pick one.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Upper bound on the records reserved up front for a new batch.
const MAX_BATCH_PREALLOC: usize = 1024;

/// What happens when a collection reaches its batch size.
#[derive(Debug, Clone, Default)]
pub enum FlushPolicy {
    /// Publish the threshold signal only; the batch keeps growing until the
    /// caller flushes.
    #[default]
    Advisory,
    /// Publish the signal and hand the batch to the sink.
    Synchronous(mpsc::UnboundedSender<Batch>),
}

/// Outcome of the subscribe phase of `collect`.
#[derive(Debug, Clone, Default)]
pub struct SubscribeReport {
    pub active: Vec<String>,
    pub failed: Vec<SubscriptionError>,
}

/// Running counters of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub ticks_received: u64,
    pub thresholds_fired: u64,
    pub records_flushed: u64,
    pub dropped_ticks: u64,
    pub connection_lost: u64,
    pub connection_restored: u64,
    pub symbols: BTreeMap<String, LinkStatus>,
}

enum Command {
    Tick(Tick),
    Status { symbol: String, status: LinkStatus },
    Flush(oneshot::Sender<Batch>),
    Stop(oneshot::Sender<Batch>),
}

/// Opens collections against an event source.
#[derive(Clone)]
pub struct IngestionCollector {
    source: DynEventSource,
    next_id: Arc<AtomicU64>,
}

impl IngestionCollector {
    pub fn new(source: DynEventSource) -> Self {
        Self {
            source,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to `symbols` and batch their ticks under the advisory policy.
    pub async fn collect(&self, symbols: &[String], batch_size: usize) -> FeedResult<Collection> {
        self.collect_with_policy(symbols, batch_size, FlushPolicy::Advisory)
            .await
    }

    /// Subscribe to `symbols` and batch their ticks.
    ///
    /// A symbol whose subscribe is rejected is reported in
    /// [`Collection::report`]; the others stay active. If every symbol is
    /// rejected the first rejection is returned as the error.
    pub async fn collect_with_policy(
        &self,
        symbols: &[String],
        batch_size: usize,
        policy: FlushPolicy,
    ) -> FeedResult<Collection> {
        if batch_size == 0 {
            return Err(FeedError::InvalidParameter(
                "batch size must be positive".to_string(),
            ));
        }
        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if !unique.contains(symbol) {
                unique.push(symbol.clone());
            }
        }
        if unique.is_empty() {
            return Err(FeedError::InvalidParameter(
                "at least one symbol is required".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(CollectionStats::default()));
        let (threshold_tx, threshold_rx) = watch::channel(0u64);

        let writer = BatchWriter {
            batch: Batch::with_capacity(batch_size.min(MAX_BATCH_PREALLOC)),
            counter: 0,
            batch_size,
            policy,
            stats: stats.clone(),
            threshold_tx,
        };
        let writer_handle = tokio::spawn(writer.run(rx));

        let sink: TickSink = {
            let tx = tx.clone();
            Arc::new(move |tick: Tick| {
                // Fails only after stop; late ticks are dropped silently.
                let _ = tx.send(Command::Tick(tick));
            })
        };

        let results = join_all(
            unique
                .iter()
                .map(|symbol| self.source.subscribe(symbol, sink.clone())),
        )
        .await;

        let mut handles = Vec::new();
        let mut report = SubscribeReport::default();
        for result in results {
            match result {
                Ok(handle) => {
                    report.active.push(handle.symbol().to_string());
                    handles.push(handle);
                }
                Err(e) => {
                    warn!(collection = id, symbol = %e.symbol, reason = %e.reason, "Subscription failed");
                    Metrics::subscription_failed(&e.symbol);
                    report.failed.push(e);
                }
            }
        }

        if handles.is_empty() {
            writer_handle.abort();
            let first = report
                .failed
                .into_iter()
                .next()
                .ok_or(FeedError::CollectionClosed)?;
            return Err(FeedError::Subscription(first));
        }

        {
            let mut stats = stats.lock();
            for handle in &handles {
                stats
                    .symbols
                    .insert(handle.symbol().to_string(), handle.status());
            }
        }

        let cancel = CancellationToken::new();
        for handle in &handles {
            spawn_status_watcher(handle, tx.clone(), cancel.clone());
        }
        Metrics::subscriptions_opened(handles.len());

        info!(
            collection = id,
            batch_size,
            active = ?report.active,
            failed = report.failed.len(),
            "Collection started"
        );

        Ok(Collection {
            id,
            source: self.source.clone(),
            tx,
            handles,
            report,
            stats,
            threshold_rx,
            cancel,
            writer: writer_handle,
        })
    }
}

fn spawn_status_watcher(
    handle: &SubscriptionHandle,
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
) {
    let symbol = handle.symbol().to_string();
    let mut status_rx = handle.status_changes();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    let command = Command::Status { symbol: symbol.clone(), status };
                    if tx.send(command).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Single owner of the batch and threshold counter.
struct BatchWriter {
    batch: Batch,
    counter: usize,
    batch_size: usize,
    policy: FlushPolicy,
    stats: Arc<Mutex<CollectionStats>>,
    threshold_tx: watch::Sender<u64>,
}

impl BatchWriter {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Tick(tick) => self.on_tick(tick),
                Command::Status { symbol, status } => self.on_status(symbol, status),
                Command::Flush(reply) => {
                    let _ = reply.send(self.take_batch());
                }
                Command::Stop(reply) => {
                    let _ = reply.send(self.take_batch());
                    break;
                }
            }
        }
    }

    fn on_tick(&mut self, tick: Tick) {
        let record = match TradeRecord::try_from(tick) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Dropping invalid tick");
                Metrics::tick_dropped("invalid_price");
                self.stats.lock().dropped_ticks += 1;
                return;
            }
        };

        Metrics::tick_received(record.symbol());
        self.batch.push(record);
        self.counter += 1;
        let thresholds = {
            let mut stats = self.stats.lock();
            stats.ticks_received += 1;
            if self.counter < self.batch_size {
                return;
            }
            stats.thresholds_fired += 1;
            stats.thresholds_fired
        };

        self.counter = 0;
        self.threshold_tx.send_replace(thresholds);
        Metrics::batch_threshold_reached();
        debug!(thresholds, batch_len = self.batch.len(), "Batch threshold reached");

        if !matches!(self.policy, FlushPolicy::Synchronous(_)) {
            return;
        }
        let batch = self.take_batch();
        if let FlushPolicy::Synchronous(sink) = &self.policy {
            if let Err(e) = sink.send(batch) {
                warn!(records = e.0.len(), "Batch sink closed, records discarded");
            }
        }
    }

    fn on_status(&mut self, symbol: String, status: LinkStatus) {
        let mut stats = self.stats.lock();
        match status {
            LinkStatus::Lost => {
                warn!(%symbol, "Connection lost, waiting for source to reconnect");
                stats.connection_lost += 1;
                Metrics::connection_event(&symbol, "lost");
            }
            LinkStatus::Restored => {
                info!(%symbol, "Connection restored");
                stats.connection_restored += 1;
                Metrics::connection_event(&symbol, "restored");
            }
            LinkStatus::Connected => {}
        }
        stats.symbols.insert(symbol, status);
    }

    fn take_batch(&mut self) -> Batch {
        let batch = self.batch.take();
        self.stats.lock().records_flushed += batch.len() as u64;
        batch
    }
}

/// A running set of subscriptions and their batch.
///
/// Call [`Collection::stop`] to release the subscriptions.
pub struct Collection {
    id: u64,
    source: DynEventSource,
    tx: mpsc::UnboundedSender<Command>,
    handles: Vec<SubscriptionHandle>,
    report: SubscribeReport,
    stats: Arc<Mutex<CollectionStats>>,
    threshold_rx: watch::Receiver<u64>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("active", &self.report.active)
            .finish()
    }
}

impl Collection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn report(&self) -> &SubscribeReport {
        &self.report
    }

    pub fn stats(&self) -> CollectionStats {
        self.stats.lock().clone()
    }

    /// Number of times the batch size threshold was reached.
    pub fn thresholds_fired(&self) -> u64 {
        self.stats.lock().thresholds_fired
    }

    /// Receiver of the threshold signal; the value is the running count.
    pub fn threshold_signal(&self) -> watch::Receiver<u64> {
        self.threshold_rx.clone()
    }

    /// Snapshot the accumulated batch and start a new one.
    ///
    /// Every tick delivered before this call is in the returned batch.
    pub async fn flush(&self) -> FeedResult<Batch> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| FeedError::CollectionClosed)?;
        reply_rx.await.map_err(|_| FeedError::CollectionClosed)
    }

    /// Unsubscribe every symbol and return the remaining batch.
    ///
    /// Does not wait for in-flight callbacks; ticks arriving afterwards are
    /// dropped.
    pub async fn stop(self) -> FeedResult<Batch> {
        self.cancel.cancel();
        for handle in &self.handles {
            self.source.unsubscribe(handle.id()).await;
        }
        Metrics::subscriptions_closed(self.handles.len());

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Stop(reply_tx))
            .map_err(|_| FeedError::CollectionClosed)?;
        let remaining = reply_rx.await.map_err(|_| FeedError::CollectionClosed)?;
        if let Err(e) = self.writer.await {
            warn!(collection = self.id, error = %e, "Batch writer task failed");
        }

        let stats = self.stats.lock().clone();
        info!(
            collection = self.id,
            ticks = stats.ticks_received,
            thresholds = stats.thresholds_fired,
            dropped = stats.dropped_ticks,
            remaining = remaining.len(),
            "Collection stopped"
        );
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tickavg_core::{ManualEventSource, Price};

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tick(symbol: &str, price: rust_decimal::Decimal) -> Tick {
        Tick::new(symbol, Price::new(price), Utc::now())
    }

    fn setup() -> (Arc<ManualEventSource>, IngestionCollector) {
        let source = Arc::new(ManualEventSource::new());
        let collector = IngestionCollector::new(source.clone());
        (source, collector)
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_threshold_fires_once_across_symbols() {
        let (source, collector) = setup();
        let collection = collector
            .collect(&symbols(&["BTCUSDT", "ETHUSDT"]), 2)
            .await
            .unwrap();

        source.push(tick("BTCUSDT", dec!(42000)));
        source.push(tick("ETHUSDT", dec!(2500)));

        let batch = collection.flush().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(collection.thresholds_fired(), 1);
        assert_eq!(*collection.threshold_signal().borrow(), 1);
    }

    #[tokio::test]
    async fn test_counter_resets_after_threshold() {
        let (source, collector) = setup();
        let collection = collector.collect(&symbols(&["BTCUSDT"]), 2).await.unwrap();

        for _ in 0..5 {
            source.push(tick("BTCUSDT", dec!(1)));
        }
        let batch = collection.flush().await.unwrap();
        // Advisory: the batch keeps everything, the signal fired twice.
        assert_eq!(batch.len(), 5);
        assert_eq!(collection.thresholds_fired(), 2);
    }

    #[tokio::test]
    async fn test_flush_snapshots_and_replaces() {
        let (source, collector) = setup();
        let collection = collector.collect(&symbols(&["BTCUSDT"]), 10).await.unwrap();

        source.push(tick("BTCUSDT", dec!(1)));
        let first = collection.flush().await.unwrap();
        source.push(tick("BTCUSDT", dec!(2)));
        let second = collection.flush().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second.records()[0].price().inner(), dec!(2));
        assert!(collection.flush().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_symbol_does_not_affect_siblings() {
        let (source, collector) = setup();
        source.reject_symbol("Y", "Invalid symbol");

        let collection = collector.collect(&symbols(&["X", "Y"]), 10).await.unwrap();
        assert_eq!(collection.report().active, vec!["X".to_string()]);
        assert_eq!(collection.report().failed.len(), 1);
        assert_eq!(collection.report().failed[0].symbol, "Y");

        source.push(tick("X", dec!(7)));
        let batch = collection.flush().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].symbol(), "X");
    }

    #[tokio::test]
    async fn test_all_symbols_failing_is_an_error() {
        let (source, collector) = setup();
        source.reject_symbol("X", "Invalid symbol");
        source.reject_symbol("Y", "Invalid symbol");

        let err = collector.collect(&symbols(&["X", "Y"]), 10).await.unwrap_err();
        match err {
            FeedError::Subscription(e) => assert_eq!(e.symbol, "X"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_parameters() {
        let (_source, collector) = setup();
        assert!(matches!(
            collector.collect(&symbols(&["BTCUSDT"]), 0).await,
            Err(FeedError::InvalidParameter(_))
        ));
        assert!(matches!(
            collector.collect(&[], 10).await,
            Err(FeedError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_non_positive_price_is_dropped() {
        let (source, collector) = setup();
        let collection = collector.collect(&symbols(&["BTCUSDT"]), 1).await.unwrap();

        source.push(tick("BTCUSDT", dec!(0)));
        source.push(tick("BTCUSDT", dec!(-3)));
        let batch = collection.flush().await.unwrap();

        assert!(batch.is_empty());
        let stats = collection.stats();
        assert_eq!(stats.dropped_ticks, 2);
        assert_eq!(stats.thresholds_fired, 0);
    }

    #[tokio::test]
    async fn test_synchronous_policy_hands_batch_to_sink() {
        let (source, collector) = setup();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        let collection = collector
            .collect_with_policy(&symbols(&["BTCUSDT"]), 2, FlushPolicy::Synchronous(sink_tx))
            .await
            .unwrap();

        for price in [dec!(1), dec!(2), dec!(3)] {
            source.push(tick("BTCUSDT", price));
        }
        let rest = collection.flush().await.unwrap();

        let handed = sink_rx.recv().await.unwrap();
        assert_eq!(handed.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(collection.stats().records_flushed, 3);
    }

    #[tokio::test]
    async fn test_stop_returns_remainder_and_ignores_late_ticks() {
        let (source, collector) = setup();
        let collection = collector.collect(&symbols(&["BTCUSDT"]), 10).await.unwrap();

        source.push(tick("BTCUSDT", dec!(1)));
        let remaining = collection.stop().await.unwrap();
        assert_eq!(remaining.len(), 1);

        assert!(source.active_symbols().is_empty());
        assert_eq!(source.push(tick("BTCUSDT", dec!(2))), 0);
    }

    #[tokio::test]
    async fn test_connection_notifications_are_counted_not_fatal() {
        let (source, collector) = setup();
        let collection = collector.collect(&symbols(&["BTCUSDT"]), 10).await.unwrap();

        source.drop_connection("BTCUSDT");
        wait_until(|| collection.stats().connection_lost == 1).await;
        source.restore_connection("BTCUSDT");
        wait_until(|| collection.stats().connection_restored == 1).await;

        source.push(tick("BTCUSDT", dec!(5)));
        let batch = collection.flush().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            collection.stats().symbols.get("BTCUSDT"),
            Some(&LinkStatus::Restored)
        );
        assert_eq!(source.active_symbols(), vec!["BTCUSDT".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_symbols_subscribe_once() {
        let (source, collector) = setup();
        let _collection = collector
            .collect(&symbols(&["BTCUSDT", "BTCUSDT"]), 10)
            .await
            .unwrap();
        assert_eq!(source.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_huge_batch_size_collects_without_threshold() {
        let (source, collector) = setup();
        let collection = collector
            .collect(&symbols(&["BTCUSDT"]), usize::MAX)
            .await
            .unwrap();

        source.push(tick("BTCUSDT", dec!(1)));
        source.push(tick("BTCUSDT", dec!(2)));

        let batch = collection.flush().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(collection.thresholds_fired(), 0);
    }

    #[tokio::test]
    async fn test_synchronous_policy_keeps_collecting_after_handoff() {
        let (source, collector) = setup();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        let collection = collector
            .collect_with_policy(&symbols(&["ETHUSDT"]), 1, FlushPolicy::Synchronous(sink_tx))
            .await
            .unwrap();

        source.push(tick("ETHUSDT", dec!(2500)));
        source.push(tick("ETHUSDT", dec!(2501)));

        let first = sink_rx.recv().await.unwrap();
        let second = sink_rx.recv().await.unwrap();
        assert_eq!(first.records()[0].price(), Price::new(dec!(2500)));
        assert_eq!(second.records()[0].price(), Price::new(dec!(2501)));
        assert!(collection.flush().await.unwrap().is_empty());
        assert_eq!(collection.thresholds_fired(), 2);
    }
}
