//! Heartbeat tracking for one stream connection.
//!
//! A ping is due after `interval` of silence; the connection is considered
//! dead if no pong arrives within `timeout` of that ping.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_message: Instant,
    last_ping: Option<Instant>,
    waiting_for_pong: bool,
}

/// Heartbeat manager for a single connection.
#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    timeout: Duration,
    state: Mutex<HeartbeatState>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            state: Mutex::new(HeartbeatState {
                last_message: Instant::now(),
                last_ping: None,
                waiting_for_pong: false,
            }),
        }
    }

    /// Reset state (called on every new connection).
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_message = Instant::now();
        state.last_ping = None;
        state.waiting_for_pong = false;
    }

    pub fn record_message(&self) {
        self.state.lock().last_message = Instant::now();
    }

    pub fn record_ping(&self) {
        let mut state = self.state.lock();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut state = self.state.lock();
        state.waiting_for_pong = false;
        state.last_message = Instant::now();
        if let Some(ping) = state.last_ping {
            debug!(rtt_ms = ping.elapsed().as_millis() as u64, "Received pong");
        }
    }

    pub fn is_timed_out(&self) -> bool {
        let state = self.state.lock();
        match (state.waiting_for_pong, state.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// Ping is due: not already waiting and silent for `interval`.
    pub fn should_send_heartbeat(&self) -> bool {
        let state = self.state.lock();
        !state.waiting_for_pong && state.last_message.elapsed() >= self.interval
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        let tick = (self.interval / 2).min(self.timeout / 2);
        tokio::time::sleep(tick.max(Duration::from_millis(10))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ping_due_after_silence() {
        let hb = HeartbeatManager::new(1_000, 500);
        assert!(!hb.should_send_heartbeat());

        tokio::time::advance(Duration::from_millis(1_001)).await;
        assert!(hb.should_send_heartbeat());

        hb.record_ping();
        assert!(!hb.should_send_heartbeat());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_timeout() {
        let hb = HeartbeatManager::new(1_000, 500);
        hb.record_ping();
        assert!(!hb.is_timed_out());

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(hb.is_timed_out());

        hb.record_pong();
        assert!(!hb.is_timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_postpone_ping() {
        let hb = HeartbeatManager::new(1_000, 500);
        tokio::time::advance(Duration::from_millis(900)).await;
        hb.record_message();
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(!hb.should_send_heartbeat());
    }
}
