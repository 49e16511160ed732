//! Event source collaborator interface.
//!
//! An `EventSource` is a per-symbol push feed of trade ticks. Each accepted
//! subscription delivers ticks to a `TickSink` callback from whatever task
//! the source runs on, and publishes connection notifications through a
//! `watch` channel on the returned handle.

use crate::Tick;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Callback invoked for every delivered tick.
pub type TickSink = Arc<dyn Fn(Tick) + Send + Sync>;

/// Connection state of an established subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Initial state after a successful subscribe.
    Connected,
    /// Upstream connection dropped; the source is reconnecting.
    Lost,
    /// Upstream connection re-established and delivery resumed.
    Restored,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Lost => write!(f, "lost"),
            Self::Restored => write!(f, "restored"),
        }
    }
}

/// Upstream rejected a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Subscription to {symbol} failed: {reason}")]
pub struct SubscriptionError {
    pub symbol: String,
    pub reason: String,
}

impl SubscriptionError {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

/// Handle to one live per-symbol subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    symbol: String,
    status: watch::Receiver<LinkStatus>,
}

impl SubscriptionHandle {
    pub fn new(id: u64, symbol: impl Into<String>, status: watch::Receiver<LinkStatus>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            status,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current connection state.
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Receiver for connection notifications (lost / restored).
    pub fn status_changes(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }
}

/// Per-symbol trade feed.
///
/// Implementations must:
/// - fail `subscribe` synchronously (as the future's result) when upstream
///   rejects the request, without affecting other subscriptions
/// - keep an accepted subscription alive across reconnects, publishing
///   `Lost` / `Restored` on the handle's status channel
/// - stop delivering ticks promptly after `unsubscribe` / `unsubscribe_all`,
///   without waiting for in-flight callbacks
pub trait EventSource: Send + Sync {
    /// Open a subscription for `symbol`, delivering ticks to `on_tick`.
    fn subscribe<'a>(
        &'a self,
        symbol: &'a str,
        on_tick: TickSink,
    ) -> BoxFuture<'a, Result<SubscriptionHandle, SubscriptionError>>;

    /// Cancel a single subscription by handle id. Unknown ids are ignored.
    fn unsubscribe(&self, id: u64) -> BoxFuture<'_, ()>;

    /// Cancel every active subscription.
    fn unsubscribe_all(&self) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for EventSource trait objects.
pub type DynEventSource = Arc<dyn EventSource>;
