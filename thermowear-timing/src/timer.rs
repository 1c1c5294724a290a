use chrono::Utc;
use tokio::time::Instant;

/// Source of the wall-clock timestamps stored in responses.
pub trait Clock: Clone + Send + Sync {
    /// Seconds since the Unix epoch, millisecond resolution.
    fn now(&self) -> f64;
}

/// Current wall-clock time in epoch seconds.
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Epoch clock anchored once and advanced by the runtime's monotonic clock.
///
/// Wall-clock adjustments during a session do not reorder timestamps, and a
/// paused tokio clock in tests moves it deterministically.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_epoch: f64,
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(epoch_seconds())
    }

    pub fn anchored_at(anchor_epoch: f64) -> Self {
        Self {
            anchor_epoch,
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_millis() as f64;
        self.anchor_epoch + elapsed_ms / 1000.0
    }
}
