//! `EventSource` implementation over Binance raw trade streams.

use crate::config::SourceConfig;
use crate::connection::SymbolConnection;
use crate::error::WsError;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tickavg_core::{
    EventSource, LinkStatus, SubscriptionError, SubscriptionHandle, TickSink,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct LiveSubscription {
    symbol: String,
    cancel: CancellationToken,
}

/// Binance trade feed, one connection per subscription.
pub struct BinanceTradeSource {
    config: SourceConfig,
    live: Arc<DashMap<u64, LiveSubscription>>,
    next_id: AtomicU64,
    request_ids: Arc<AtomicU64>,
}

impl BinanceTradeSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            live: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            request_ids: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Number of subscriptions whose connection task is still running.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn validate_symbol(symbol: &str) -> Result<(), WsError> {
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(WsError::InvalidSymbol(symbol.to_string()));
        }
        Ok(())
    }
}

impl EventSource for BinanceTradeSource {
    fn subscribe<'a>(
        &'a self,
        symbol: &'a str,
        on_tick: TickSink,
    ) -> BoxFuture<'a, Result<SubscriptionHandle, SubscriptionError>> {
        Box::pin(async move {
            Self::validate_symbol(symbol)
                .map_err(|e| SubscriptionError::new(symbol, e.to_string()))?;

            let (status_tx, status_rx) = watch::channel(LinkStatus::Connected);
            let cancel = CancellationToken::new();
            let connection = SymbolConnection {
                config: self.config.clone(),
                symbol: symbol.to_string(),
                sink: on_tick,
                status_tx,
                cancel: cancel.clone(),
                request_ids: self.request_ids.clone(),
            };

            let ws = connection
                .establish()
                .await
                .map_err(|e| SubscriptionError::new(symbol, e.to_string()))?;

            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.live.insert(
                id,
                LiveSubscription {
                    symbol: symbol.to_string(),
                    cancel,
                },
            );

            let live = self.live.clone();
            tokio::spawn(async move {
                connection.run(ws).await;
                live.remove(&id);
            });

            Ok(SubscriptionHandle::new(id, symbol, status_rx))
        })
    }

    fn unsubscribe(&self, id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some((_, sub)) = self.live.remove(&id) {
                debug!(id, symbol = %sub.symbol, "Unsubscribing");
                sub.cancel.cancel();
            }
        })
    }

    fn unsubscribe_all(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let ids: Vec<u64> = self.live.iter().map(|entry| *entry.key()).collect();
            for id in &ids {
                if let Some((_, sub)) = self.live.remove(id) {
                    sub.cancel.cancel();
                }
            }
            info!(count = ids.len(), "Unsubscribed all trade streams");
        })
    }
}
