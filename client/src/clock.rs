//! Client side of the `clock:sync` exchange.
//!
//! DESIGN
//! ======
//! Each ping carries the client's send time; the server echoes it with its
//! own clock reading. Half the round trip is assumed to be the one-way
//! latency, so the offset is `(sent + rtt / 2) - serverNow`. Only the sample
//! with the lowest round trip is kept: a fast exchange bounds the error more
//! tightly than any average of slow ones.
//!
//! All times are epoch milliseconds passed in by the caller, which keeps the
//! estimator deterministic under test.

use std::time::Duration;

use serde_json::{Value, json};

/// Ping cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub burst_count: u32,
    pub burst_interval: Duration,
    pub steady_interval: Duration,
    /// A sample older than this is re-pinged when the next `music:tick` lands.
    pub stale_after: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            burst_count: 5,
            burst_interval: Duration::from_millis(200),
            steady_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// ESTIMATOR
// =============================================================================

/// Best-sample server clock estimate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockSync {
    best_rtt_ms: Option<f64>,
    offset_ms: Option<f64>,
    last_sample_ms: Option<i64>,
}

impl ClockSync {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn has_sync(&self) -> bool {
        self.offset_ms.is_some()
    }

    #[must_use]
    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_ms
    }

    #[must_use]
    pub fn best_rtt_ms(&self) -> Option<f64> {
        self.best_rtt_ms
    }

    /// Estimated server time. Falls back to local time before the first sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn server_now_ms(&self, local_now_ms: i64) -> i64 {
        match self.offset_ms {
            Some(offset) => (local_now_ms as f64 - offset).round() as i64,
            None => local_now_ms,
        }
    }

    /// Payload of an outbound `clock:sync` request.
    #[must_use]
    pub fn request_payload(local_now_ms: i64) -> Value {
        json!({ "clientSentAtMs": local_now_ms })
    }

    /// Fold one reply into the estimate. Returns `true` if it became the new
    /// best sample.
    #[allow(clippy::cast_precision_loss)]
    pub fn handle_response(&mut self, client_sent_at_ms: f64, server_now_ms: f64, received_at_ms: i64) -> bool {
        if !client_sent_at_ms.is_finite() || !server_now_ms.is_finite() {
            return false;
        }
        let rtt = received_at_ms as f64 - client_sent_at_ms;
        if !rtt.is_finite() || rtt < 0.0 {
            return false;
        }
        let offset = (client_sent_at_ms + rtt / 2.0) - server_now_ms;
        if !offset.is_finite() {
            return false;
        }

        self.last_sample_ms = Some(received_at_ms);
        if self.best_rtt_ms.is_some_and(|best| rtt >= best) {
            return false;
        }
        self.best_rtt_ms = Some(rtt);
        self.offset_ms = Some(offset);
        true
    }

    /// Parse a `clock:sync` reply payload and fold it in.
    pub fn handle_reply(&mut self, data: &Value, received_at_ms: i64) -> bool {
        let sent = data.get("clientSentAtMs").and_then(Value::as_f64);
        let server = data.get("serverNowMs").and_then(Value::as_f64);
        match (sent, server) {
            (Some(sent), Some(server)) => self.handle_response(sent, server, received_at_ms),
            _ => false,
        }
    }

    /// No sample yet, or the last one is older than `stale_after`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn is_stale(&self, local_now_ms: i64, stale_after: Duration) -> bool {
        self.last_sample_ms
            .is_none_or(|last| local_now_ms - last > stale_after.as_millis() as i64)
    }
}

// =============================================================================
// PING SCHEDULE
// =============================================================================

/// When the next ping is due: a quick burst, then a slow steady cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingSchedule {
    config: ClockConfig,
    burst_remaining: u32,
    next_at_ms: Option<i64>,
}

impl PingSchedule {
    #[must_use]
    pub fn new(config: ClockConfig) -> Self {
        Self { config, burst_remaining: 0, next_at_ms: None }
    }

    /// Queue a fresh burst starting now.
    pub fn start_burst(&mut self, now_ms: i64) {
        self.burst_remaining = self.config.burst_count;
        self.next_at_ms = Some(now_ms);
    }

    pub fn stop(&mut self) {
        self.burst_remaining = 0;
        self.next_at_ms = None;
    }

    #[must_use]
    pub fn next_at_ms(&self) -> Option<i64> {
        self.next_at_ms
    }

    /// Returns `true` if a ping should go out now and advances the schedule.
    #[allow(clippy::cast_possible_truncation)]
    pub fn take_due(&mut self, now_ms: i64) -> bool {
        let Some(next) = self.next_at_ms else {
            return false;
        };
        if now_ms < next {
            return false;
        }
        self.burst_remaining = self.burst_remaining.saturating_sub(1);
        let gap = if self.burst_remaining > 0 { self.config.burst_interval } else { self.config.steady_interval };
        self.next_at_ms = Some(now_ms + gap.as_millis() as i64);
        true
    }
}

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;
