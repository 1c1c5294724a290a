use std::time::Duration;

use thermowear_core::Condition;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::DeviceError;
use crate::transport::Transport;

/// Cadence of temperature reads while waiting for convergence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Half-width of the band accepted around the baseline setpoint.
const BASELINE_TOLERANCE: f64 = 0.2;

/// How a convergence wait ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Convergence {
    Reached(f64),
    /// The timeout passed first. The run proceeds without confirmation.
    TimedOut,
}

impl Convergence {
    /// Temperature reported to callers that only deal in readings.
    pub const TIMEOUT_SENTINEL: f64 = -1.0;

    pub fn temperature(&self) -> f64 {
        match self {
            Convergence::Reached(temp) => *temp,
            Convergence::TimedOut => Self::TIMEOUT_SENTINEL,
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, Convergence::Reached(_))
    }
}

/// Heating element session: a transport plus the experiment's baseline.
pub struct HeatingElement<T: Transport> {
    transport: T,
    baseline: i32,
}

impl<T: Transport> HeatingElement<T> {
    pub fn new(transport: T, baseline: i32) -> Self {
        Self {
            transport,
            baseline,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Setpoint for a condition. Anything but warm or cool maps to baseline.
    pub fn compute_target(&self, condition: &Condition, delta: u32) -> i32 {
        let delta = delta as i32;
        match condition {
            Condition::Warm => self.baseline + delta,
            Condition::Cool => self.baseline - delta,
            _ => self.baseline,
        }
    }

    pub async fn set_setpoint(&self, target: i32) -> Result<(), DeviceError> {
        self.transport.put_setpoint(target).await
    }

    pub async fn return_to_baseline(&self) -> Result<(), DeviceError> {
        debug!(baseline = self.baseline, "returning to baseline");
        self.set_setpoint(self.baseline).await
    }

    pub async fn goto_target(&self, condition: &Condition, delta: u32) -> Result<(), DeviceError> {
        let target = self.compute_target(condition, delta);
        debug!(%condition, delta, target, "going to target temperature");
        self.set_setpoint(target).await
    }

    /// Liveness check run before an experiment may start.
    pub async fn probe(&self) -> Result<f64, DeviceError> {
        let temperature = self.transport.get_temperature().await?;
        info!(temperature, "heating element is reachable");
        Ok(temperature)
    }

    /// Reads the temperature every [`POLL_INTERVAL`] until the target for
    /// `condition` is reached or `timeout` passes.
    ///
    /// The timeout is checked at the start of each tick, so a wait can
    /// overrun by up to one tick. A read still pending at that point is
    /// abandoned and counts as a timeout. A failed read ends the wait with
    /// that error.
    pub async fn poll_until_reached(
        &self,
        condition: &Condition,
        delta: u32,
        timeout: Duration,
    ) -> Result<Convergence, DeviceError> {
        let target = self.compute_target(condition, delta);
        let timeout_at = Instant::now() + timeout;

        let mut ticker = time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if Instant::now() > timeout_at {
                info!(%condition, target, "convergence wait timed out");
                return Ok(Convergence::TimedOut);
            }

            let read_deadline = timeout_at.max(Instant::now() + POLL_INTERVAL);
            let temperature =
                match time::timeout_at(read_deadline, self.transport.get_temperature()).await {
                    Ok(reading) => reading?,
                    Err(_) => {
                        info!(%condition, target, "temperature read outlasted the convergence wait");
                        return Ok(Convergence::TimedOut);
                    }
                };
            if has_converged(condition, target, temperature) {
                debug!(%condition, target, temperature, "target temperature reached");
                return Ok(Convergence::Reached(temperature));
            }
        }
    }
}

fn has_converged(condition: &Condition, target: i32, temperature: f64) -> bool {
    let target = f64::from(target);
    match condition {
        Condition::Warm => temperature >= target,
        Condition::Cool => temperature <= target,
        // Either side of the band satisfies this, so almost any reading
        // passes. Kept as deployed until the intended band is confirmed.
        Condition::Baseline => {
            temperature >= target - BASELINE_TOLERANCE || temperature <= target + BASELINE_TOLERANCE
        }
        Condition::Unrecognized(_) => false,
    }
}
