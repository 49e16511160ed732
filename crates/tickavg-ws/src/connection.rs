//! Per-symbol stream connection.
//!
//! Handles connection establishment with SUBSCRIBE acknowledgement, the read
//! loop, and automatic reconnection with exponential backoff for one
//! established subscription.

use crate::config::SourceConfig;
use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::{StreamMessage, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickavg_core::{LinkStatus, TickSink};
use tickavg_telemetry::Metrics;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything one subscription task needs.
pub(crate) struct SymbolConnection {
    pub config: SourceConfig,
    pub symbol: String,
    pub sink: TickSink,
    pub status_tx: watch::Sender<LinkStatus>,
    pub cancel: CancellationToken,
    pub request_ids: Arc<AtomicU64>,
}

impl SymbolConnection {
    /// Connect, subscribe and wait for the acknowledgement.
    pub async fn establish(&self) -> WsResult<WsStream> {
        let timeout_ms = self.config.subscribe_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.connect_and_subscribe())
            .await
            .map_err(|_| WsError::SubscribeTimeout(timeout_ms))?
    }

    async fn connect_and_subscribe(&self) -> WsResult<WsStream> {
        debug!(url = %self.config.url, symbol = %self.symbol, "Connecting to trade stream");

        // TCP_NODELAY: ticks are small and latency matters more than throughput.
        let (mut ws, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;

        let id = self.request_ids.fetch_add(1, Ordering::SeqCst) + 1;
        let request = serde_json::to_string(&SubscribeRequest::subscribe(&self.symbol, id))?;
        ws.send(Message::Text(request)).await?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<StreamMessage>(&text)
                {
                    Ok(StreamMessage::Response(resp)) if resp.id == id => {
                        if let Some(err) = resp.error {
                            return Err(WsError::SubscribeRejected {
                                code: err.code,
                                msg: err.msg,
                            });
                        }
                        info!(symbol = %self.symbol, request_id = id, "Trade stream subscribed");
                        return Ok(ws);
                    }
                    Ok(other) => self.dispatch(other),
                    Err(e) => warn!(error = %e, "Unparseable message during subscribe"),
                },
                Some(Ok(Message::Ping(data))) => {
                    ws.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = close_details(frame, "Close during subscription");
                    return Err(WsError::ConnectionClosed { code, reason });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(WsError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended during subscription".to_string(),
                    })
                }
            }
        }
    }

    /// Drive an established stream until cancelled, reconnecting on failure.
    pub async fn run(self, initial: WsStream) {
        let heartbeat = HeartbeatManager::new(
            self.config.heartbeat_interval_ms,
            self.config.heartbeat_timeout_ms,
        );
        let mut stream = Some(initial);
        let mut attempt = 0u32;

        loop {
            if let Some(ws) = stream.take() {
                match self.read_loop(ws, &heartbeat).await {
                    Ok(()) => break,
                    Err(e) => {
                        warn!(symbol = %self.symbol, error = %e, "Trade stream lost");
                        self.status_tx.send_replace(LinkStatus::Lost);
                    }
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt > self.config.max_reconnect_attempts
            {
                error!(symbol = %self.symbol, attempt, "Max reconnection attempts reached");
                break;
            }

            let delay = backoff_delay(&self.config, attempt);
            warn!(symbol = %self.symbol, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.cancel.cancelled() => break,
            }

            Metrics::ws_reconnect(&self.symbol);
            match self.establish().await {
                Ok(ws) => {
                    info!(symbol = %self.symbol, attempt, "Trade stream restored");
                    attempt = 0;
                    self.status_tx.send_replace(LinkStatus::Restored);
                    stream = Some(ws);
                }
                Err(e) => {
                    warn!(symbol = %self.symbol, attempt, error = %e, "Reconnect failed");
                }
            }
        }

        debug!(symbol = %self.symbol, "Trade stream task exiting");
    }

    /// Returns `Ok(())` only when cancelled.
    async fn read_loop(&self, ws: WsStream, heartbeat: &HeartbeatManager) -> WsResult<()> {
        let (mut write, mut read) = ws.split();
        heartbeat.reset();

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send Close frame on unsubscribe");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            heartbeat.record_message();
                            match serde_json::from_str::<StreamMessage>(&text) {
                                Ok(parsed) => self.dispatch(parsed),
                                Err(e) => warn!(symbol = %self.symbol, error = %e, "Unparseable stream message"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => heartbeat.record_pong(),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = close_details(frame, "Normal close");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }

                () = heartbeat.wait_for_check() => {
                    if heartbeat.is_timed_out() {
                        return Err(WsError::HeartbeatTimeout);
                    }
                    if heartbeat.should_send_heartbeat() {
                        write.send(Message::Ping(Vec::new())).await?;
                        heartbeat.record_ping();
                        debug!(symbol = %self.symbol, "Sent heartbeat ping");
                    }
                }
            }
        }
    }

    fn dispatch(&self, msg: StreamMessage) {
        match msg {
            StreamMessage::Trade(event) => {
                if self.cancel.is_cancelled() {
                    return;
                }
                match event.to_tick() {
                    Some(tick) => (self.sink)(tick),
                    None => debug!(symbol = %self.symbol, event = %event.event_type, "Ignoring event"),
                }
            }
            StreamMessage::Response(resp) => {
                debug!(symbol = %self.symbol, id = resp.id, error = ?resp.error, "Command response");
            }
            StreamMessage::Other(value) => {
                debug!(symbol = %self.symbol, %value, "Ignoring unrecognised message");
            }
        }
    }
}

fn close_details(
    frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>,
    default_reason: &str,
) -> (u16, String) {
    frame
        .map(|f| (f.code.into(), f.reason.to_string()))
        .unwrap_or((1000, default_reason.to_string()))
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at the configured
/// maximum, plus jitter of up to half the base delay.
pub(crate) fn backoff_delay(config: &SourceConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = config
        .reconnect_base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.reconnect_max_delay_ms);
    Duration::from_millis(delay + jitter(config.reconnect_base_delay_ms / 2))
}

fn jitter(max_ms: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    if max_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % (max_ms + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64, max: u64) -> SourceConfig {
        SourceConfig {
            reconnect_base_delay_ms: base,
            reconnect_max_delay_ms: max,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let config = config(100, 60_000);
        let first = backoff_delay(&config, 1).as_millis() as u64;
        let third = backoff_delay(&config, 3).as_millis() as u64;
        assert!((100..=150).contains(&first), "first = {first}");
        assert!((400..=450).contains(&third), "third = {third}");
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = config(1_000, 5_000);
        let delay = backoff_delay(&config, 30).as_millis() as u64;
        assert!((5_000..=5_500).contains(&delay), "delay = {delay}");
    }

    #[test]
    fn test_jitter_bounds() {
        assert_eq!(jitter(0), 0);
        assert!(jitter(10) <= 10);
    }
}
