use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Countdown display timer.
///
/// Ticks once immediately and then every `step` until `total` has elapsed,
/// reporting the whole seconds left. It drives a display only: phase
/// transitions keep their own deadline, and dropping the countdown cancels it.
#[derive(Debug)]
pub struct Countdown {
    deadline: Instant,
    interval: Interval,
    finished: bool,
}

impl Countdown {
    pub fn start(total: Duration, step: Duration) -> Self {
        let mut interval = time::interval(step);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            deadline: deadline_after(total),
            interval,
            finished: false,
        }
    }

    /// Waits for the next tick. Returns the remaining whole seconds, or
    /// `None` once the countdown has run out.
    pub async fn tick(&mut self) -> Option<u64> {
        if self.finished {
            return None;
        }
        self.interval.tick().await;
        let remaining = self.remaining();
        if remaining.is_zero() {
            self.finished = true;
            return None;
        }
        Some(remaining.as_secs())
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// `Instant::now() + total`, saturating at roughly a century for durations
/// the platform clock cannot represent.
fn deadline_after(total: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
    let now = Instant::now();
    now.checked_add(total)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_whole_seconds() {
        let mut countdown = Countdown::start(Duration::from_secs(3), Duration::from_secs(1));
        let mut ticks = Vec::new();
        while let Some(remaining) = countdown.tick().await {
            ticks.push(remaining);
        }
        assert_eq!(ticks, vec![3, 2, 1]);
        assert!(countdown.is_finished());
        assert_eq!(countdown.tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_finishes_immediately() {
        let mut countdown = Countdown::start(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(countdown.tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_total_keeps_counting() {
        let mut countdown = Countdown::start(Duration::MAX, Duration::from_secs(1));
        let first = countdown.tick().await.unwrap();
        assert!(first > 0);
        assert!(!countdown.is_finished());
    }
}
