//! Event source configuration.

use serde::{Deserialize, Serialize};

/// Binance trade-stream connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Raw stream endpoint.
    pub url: String,
    /// Time allowed for connect + SUBSCRIBE acknowledgement.
    pub subscribe_timeout_ms: u64,
    /// Maximum reconnection attempts per outage (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Silence after which a ping is sent.
    pub heartbeat_interval_ms: u64,
    /// Pong must arrive within this.
    pub heartbeat_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.binance.com:9443/ws".to_string(),
            subscribe_timeout_ms: 10_000,
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 60_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(config.url.starts_with("wss://"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SourceConfig =
            serde_json::from_str(r#"{"url":"ws://127.0.0.1:9000","subscribe_timeout_ms":500}"#)
                .unwrap();
        assert_eq!(config.url, "ws://127.0.0.1:9000");
        assert_eq!(config.subscribe_timeout_ms, 500);
        assert_eq!(config.reconnect_base_delay_ms, 1_000);
    }
}
