//! Playback drift correction.
//!
//! Every `sample_interval` the player's position is compared with where the
//! shared stream says it should be. Small drift is ignored, medium drift is
//! absorbed by briefly changing the playback rate, and large drift is fixed
//! with a hard seek.

use std::time::Duration;

use tracing::debug;

use crate::player::MediaPlayer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftConfig {
    pub sample_interval: Duration,
    /// Drift below this many seconds is left alone.
    pub tolerance_secs: f64,
    /// Drift at or above this many seconds triggers a seek.
    pub seek_threshold_secs: f64,
    pub catch_up_rate: f64,
    pub slow_down_rate: f64,
    /// How long a nudged rate is held before returning to 1.0.
    pub rate_hold: Duration,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(2),
            tolerance_secs: 0.25,
            seek_threshold_secs: 2.0,
            catch_up_rate: 1.05,
            slow_down_rate: 0.95,
            rate_hold: Duration::from_secs(2),
        }
    }
}

/// What one drift sample decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftAction {
    None,
    Nudge { rate: f64 },
    Seek { to_secs: f64 },
}

/// Classify a drift of `actual - expected` seconds.
#[must_use]
pub fn classify(drift_secs: f64, expected_secs: f64, config: &DriftConfig) -> DriftAction {
    if !drift_secs.is_finite() || drift_secs.abs() < config.tolerance_secs {
        return DriftAction::None;
    }
    if drift_secs.abs() >= config.seek_threshold_secs {
        return DriftAction::Seek { to_secs: expected_secs.max(0.0) };
    }
    // Positive drift means the player is ahead.
    let rate = if drift_secs > 0.0 { config.slow_down_rate } else { config.catch_up_rate };
    DriftAction::Nudge { rate }
}

/// Sampling timer plus the pending rate restore.
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    config: DriftConfig,
    next_sample_ms: Option<i64>,
    restore_rate_at_ms: Option<i64>,
}

impl DriftCorrector {
    #[must_use]
    pub fn new(config: DriftConfig) -> Self {
        Self { config, next_sample_ms: None, restore_rate_at_ms: None }
    }

    #[must_use]
    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Begin sampling for a new track. The first sample waits one interval.
    #[allow(clippy::cast_possible_truncation)]
    pub fn start(&mut self, now_ms: i64) {
        self.next_sample_ms = Some(now_ms + self.config.sample_interval.as_millis() as i64);
        self.restore_rate_at_ms = None;
    }

    pub fn stop(&mut self) {
        self.next_sample_ms = None;
        self.restore_rate_at_ms = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.next_sample_ms.is_some()
    }

    /// Run any due work against the player. `expected_secs` is where the
    /// shared stream is right now.
    #[allow(clippy::cast_possible_truncation)]
    pub fn poll(&mut self, now_ms: i64, expected_secs: f64, player: &mut dyn MediaPlayer) -> DriftAction {
        if self.restore_rate_at_ms.is_some_and(|at| now_ms >= at) {
            self.restore_rate_at_ms = None;
            player.set_rate(1.0);
        }

        let Some(next) = self.next_sample_ms else {
            return DriftAction::None;
        };
        if now_ms < next {
            return DriftAction::None;
        }
        self.next_sample_ms = Some(now_ms + self.config.sample_interval.as_millis() as i64);

        let Some(actual) = player.current_time().filter(|t| t.is_finite()) else {
            return DriftAction::None;
        };
        let drift = actual - expected_secs;
        let action = classify(drift, expected_secs, &self.config);
        match action {
            DriftAction::None => {}
            DriftAction::Nudge { rate } => {
                debug!(drift, rate, "drift: nudging playback rate");
                player.set_rate(rate);
                self.restore_rate_at_ms = Some(now_ms + self.config.rate_hold.as_millis() as i64);
            }
            DriftAction::Seek { to_secs } => {
                debug!(drift, to_secs, "drift: seeking");
                player.seek(to_secs);
            }
        }
        action
    }
}

#[cfg(test)]
#[path = "drift_test.rs"]
mod tests;
