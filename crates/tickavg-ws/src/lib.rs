//! Binance trade-stream event source.
//!
//! One WebSocket connection per subscribed symbol with:
//! - SUBSCRIBE acknowledgement within a timeout
//! - Automatic reconnection with exponential backoff and jitter
//! - Idle heartbeat (ping after silence, pong timeout detection)
//! - Lost / restored notifications on the subscription handle

pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod source;

pub use config::SourceConfig;
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatManager;
pub use message::{CommandError, CommandResponse, StreamMessage, SubscribeRequest, TradeEvent};
pub use source::BinanceTradeSource;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
