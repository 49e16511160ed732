//! In-process event source driven by the caller.
//!
//! Used for replaying recorded ticks and as a test harness: ticks are pushed
//! with [`ManualEventSource::push`], rejections and connection drops are
//! scripted per symbol.

use crate::source::{EventSource, LinkStatus, SubscriptionError, SubscriptionHandle, TickSink};
use crate::Tick;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

struct ManualSubscription {
    id: u64,
    symbol: String,
    sink: TickSink,
    status_tx: watch::Sender<LinkStatus>,
}

/// Caller-driven [`EventSource`].
#[derive(Default)]
pub struct ManualEventSource {
    subscriptions: Mutex<Vec<ManualSubscription>>,
    rejections: Mutex<HashMap<String, String>>,
    next_id: AtomicU64,
    subscribe_calls: AtomicU64,
}

impl std::fmt::Debug for ManualEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualEventSource")
            .field("active", &self.active_symbols())
            .finish()
    }
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future subscribe for `symbol` fail with `reason`.
    pub fn reject_symbol(&self, symbol: &str, reason: &str) {
        self.rejections
            .lock()
            .insert(symbol.to_string(), reason.to_string());
    }

    /// Deliver a tick to every active subscription of its symbol.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn push(&self, tick: Tick) -> usize {
        // Clone sinks out so callbacks never run under the lock.
        let sinks: Vec<TickSink> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.symbol == tick.symbol)
            .map(|s| s.sink.clone())
            .collect();
        for sink in &sinks {
            sink(tick.clone());
        }
        sinks.len()
    }

    /// Publish `Lost` for every subscription of `symbol`.
    pub fn drop_connection(&self, symbol: &str) {
        self.publish(symbol, LinkStatus::Lost);
    }

    /// Publish `Restored` for every subscription of `symbol`.
    pub fn restore_connection(&self, symbol: &str) {
        self.publish(symbol, LinkStatus::Restored);
    }

    /// Symbols with at least one active subscription.
    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .subscriptions
            .lock()
            .iter()
            .map(|s| s.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Total subscribe calls, accepted or rejected.
    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    fn publish(&self, symbol: &str, status: LinkStatus) {
        for sub in self.subscriptions.lock().iter().filter(|s| s.symbol == symbol) {
            sub.status_tx.send_replace(status);
        }
    }
}

impl EventSource for ManualEventSource {
    fn subscribe<'a>(
        &'a self,
        symbol: &'a str,
        on_tick: TickSink,
    ) -> BoxFuture<'a, Result<SubscriptionHandle, SubscriptionError>> {
        Box::pin(async move {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = self.rejections.lock().get(symbol) {
                return Err(SubscriptionError::new(symbol, reason.clone()));
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let (status_tx, status_rx) = watch::channel(LinkStatus::Connected);
            self.subscriptions.lock().push(ManualSubscription {
                id,
                symbol: symbol.to_string(),
                sink: on_tick,
                status_tx,
            });
            Ok(SubscriptionHandle::new(id, symbol, status_rx))
        })
    }

    fn unsubscribe(&self, id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.subscriptions.lock().retain(|s| s.id != id);
        })
    }

    fn unsubscribe_all(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.subscriptions.lock().clear();
        })
    }
}
