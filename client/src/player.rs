//! Media playback seam.
//!
//! The sync layer never decodes media; it drives whatever implements
//! [`MediaPlayer`]. [`HeadlessPlayer`] is a clock-only implementation for
//! terminals and tests that just tracks where playback would be.

use std::time::Instant;

pub trait MediaPlayer: Send {
    /// Start `link` at `start_secs`. Ambient streams loop.
    fn load(&mut self, link: &str, start_secs: f64, looping: bool);
    fn seek(&mut self, secs: f64);
    fn set_rate(&mut self, rate: f64);
    /// Current position in seconds, or `None` while nothing is loaded.
    fn current_time(&self) -> Option<f64>;
    fn stop(&mut self);
}

/// Tracks a virtual playhead against the local monotonic clock.
#[derive(Debug, Default)]
pub struct HeadlessPlayer {
    link: Option<String>,
    anchor: Option<(Instant, f64)>,
    rate: f64,
}

impl HeadlessPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self { rate: 1.0, ..Self::default() }
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn rebase(&mut self, secs: f64) {
        self.anchor = Some((Instant::now(), secs.max(0.0)));
    }
}

impl MediaPlayer for HeadlessPlayer {
    fn load(&mut self, link: &str, start_secs: f64, _looping: bool) {
        self.link = Some(link.to_owned());
        self.rate = 1.0;
        self.rebase(start_secs);
    }

    fn seek(&mut self, secs: f64) {
        if self.link.is_some() {
            self.rebase(secs);
        }
    }

    fn set_rate(&mut self, rate: f64) {
        // Keep the playhead continuous across rate changes.
        if let Some(now) = self.current_time() {
            self.rebase(now);
        }
        self.rate = rate;
    }

    fn current_time(&self) -> Option<f64> {
        self.link.as_ref()?;
        let (at, secs) = self.anchor?;
        Some(secs + at.elapsed().as_secs_f64() * self.rate)
    }

    fn stop(&mut self) {
        self.link = None;
        self.anchor = None;
        self.rate = 1.0;
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "player_test.rs"]
mod tests;
