//! Runs one trial against the heating element and the participant.

use std::future::Future;
use std::time::Duration;

use thermowear_core::{Rating, Trial, TrialPhase};
use thermowear_device::{Convergence, HeatingElement, Transport};
use thermowear_timing::{Clock, Countdown};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::QuestionType;
use crate::error::ExperimentError;
use crate::state::ExperimentRun;
use crate::trial::StimulusTiming;

/// Longest wait for the device when the stimulus has no fixed length.
pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(10);

pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// What the participant is shown while a trial runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    PhaseEntered(TrialPhase),
    Countdown { phase: TrialPhase, remaining_secs: u64 },
    Converged(Convergence),
    StartAudio { file: String },
    StopAudio,
    FeltRecorded,
}

/// The person taking part, as seen by the protocol.
pub trait Participant {
    fn notify(&mut self, event: TrialEvent);

    /// Length of an audio clip, if it can be determined.
    fn clip_duration(&mut self, file: &str) -> Option<Duration>;

    /// Resolves when the participant reports feeling the stimulus.
    ///
    /// Must be cancel-safe. The future is dropped and recreated whenever
    /// another event fires during the stimulus.
    fn felt_stimulus(&mut self) -> impl Future<Output = ()>;

    fn rate(&mut self, trial: &Trial, question_type: QuestionType) -> impl Future<Output = Rating>;
}

pub struct TrialProtocol<'a, T: Transport, C: Clock> {
    element: &'a HeatingElement<T>,
    clock: C,
    timing: StimulusTiming,
}

impl<'a, T: Transport, C: Clock> TrialProtocol<'a, T, C> {
    pub fn new(element: &'a HeatingElement<T>, clock: C, timing: StimulusTiming) -> Self {
        Self {
            element,
            clock,
            timing,
        }
    }

    /// Runs the trial under the cursor and records its response. Does not
    /// advance the cursor.
    ///
    /// Device failures are logged and the trial carries on.
    pub async fn run_current_trial<P: Participant>(
        &self,
        run: &mut ExperimentRun,
        ui: &mut P,
    ) -> Result<(), ExperimentError> {
        let trial = run.current_trial().cloned().ok_or(ExperimentError::RunComplete)?;
        let question_type = run.config().question_type;
        debug!(
            cursor = run.cursor(),
            external = %trial.external_condition,
            condition = %trial.condition,
            intensity = trial.intensity,
            audio = trial.audio_file.as_deref().unwrap_or("-"),
            "starting trial"
        );

        let mut phase = TrialPhase::Baseline;
        ui.notify(TrialEvent::PhaseEntered(phase));
        if let Err(err) = self.element.return_to_baseline().await {
            error!(%err, "could not set adaptation setpoint");
        }

        phase = enter(phase, ui);
        self.hold(phase, self.timing.adaptation, ui).await;

        phase = enter(phase, ui);
        match self.element.goto_target(&trial.condition, trial.intensity).await {
            Ok(()) => {
                let started = self.clock.now();
                if let Some(response) = run.current_response() {
                    response.stimulus_started_at = started;
                }
            }
            Err(err) => error!(%err, "could not set target setpoint"),
        }

        let pressed_at = if self.timing.waits_for_convergence() {
            self.stimulus_until_converged(&trial, ui).await
        } else {
            self.stimulus_for_fixed_period(&trial, ui).await
        };

        phase = enter(phase, ui);
        let felt_at = if !takes_press(phase, &trial) {
            self.clock.now()
        } else if let Some(at) = pressed_at {
            at
        } else {
            ui.felt_stimulus().await;
            ui.notify(TrialEvent::FeltRecorded);
            self.clock.now()
        };
        if let Some(response) = run.current_response() {
            response.stimulus_felt_at = felt_at;
        }

        if let Err(err) = self.element.return_to_baseline().await {
            error!(%err, "could not return to baseline temperature");
        }

        phase = enter(phase, ui);
        let rating = ui.rate(&trial, question_type).await;
        run.record_rating(rating)?;

        enter(phase, ui);
        Ok(())
    }

    /// Holds the current phase for `period` while counting down.
    async fn hold<P: Participant>(&self, phase: TrialPhase, period: Duration, ui: &mut P) {
        let deadline = time::sleep(period);
        tokio::pin!(deadline);
        let mut countdown = Countdown::start(period, COUNTDOWN_STEP);

        loop {
            tokio::select! {
                biased;
                () = &mut deadline => break,
                Some(remaining_secs) = countdown.tick(), if !countdown.is_finished() => {
                    ui.notify(TrialEvent::Countdown { phase, remaining_secs });
                }
            }
        }
    }

    /// Waits for the device to report the target, then plays the clip in
    /// full. Returns the time of a press made while waiting.
    async fn stimulus_until_converged<P: Participant>(
        &self,
        trial: &Trial,
        ui: &mut P,
    ) -> Option<f64> {
        let accepts_press = takes_press(TrialPhase::Stimulus, trial);
        let mut pressed_at = None;

        let poll = self
            .element
            .poll_until_reached(&trial.condition, trial.intensity, CONVERGENCE_TIMEOUT);
        tokio::pin!(poll);

        let outcome = loop {
            tokio::select! {
                outcome = &mut poll => break outcome,
                () = ui.felt_stimulus(), if accepts_press && pressed_at.is_none() => {
                    pressed_at = Some(self.clock.now());
                    ui.notify(TrialEvent::FeltRecorded);
                }
            }
        };

        match outcome {
            Ok(convergence) => ui.notify(TrialEvent::Converged(convergence)),
            Err(err) => error!(%err, "temperature polling failed"),
        }

        if let Some(file) = &trial.audio_file {
            let clip = self.clip_length(ui, file);
            info!(file = %file, "target temperature reached, playing audio");
            ui.notify(TrialEvent::StartAudio { file: file.clone() });
            time::sleep(clip).await;
            ui.notify(TrialEvent::StopAudio);
        }

        pressed_at
    }

    /// Holds the stimulus for the configured period regardless of the device,
    /// starting the clip at its aligned offset. Returns the time of a press
    /// made during the window.
    async fn stimulus_for_fixed_period<P: Participant>(
        &self,
        trial: &Trial,
        ui: &mut P,
    ) -> Option<f64> {
        let period = self.timing.stimulus;
        let accepts_press = takes_press(TrialPhase::Stimulus, trial);
        let mut pressed_at = None;

        let audio_offset = match &trial.audio_file {
            Some(file) => {
                let offset = self.timing.audio_start_offset(self.clip_length(ui, file));
                debug!(file = %file, offset_ms = offset.as_millis() as u64, "scheduled audio start");
                offset
            }
            None => Duration::ZERO,
        };
        let mut audio_pending = trial.has_audio();
        let mut audio_playing = false;

        let deadline = time::sleep(period);
        let cue = time::sleep(audio_offset);
        tokio::pin!(deadline, cue);
        let mut countdown = Countdown::start(period, COUNTDOWN_STEP);

        loop {
            tokio::select! {
                biased;
                () = &mut deadline => break,
                () = &mut cue, if audio_pending => {
                    audio_pending = false;
                    if let Some(file) = &trial.audio_file {
                        audio_playing = true;
                        ui.notify(TrialEvent::StartAudio { file: file.clone() });
                    }
                }
                Some(remaining_secs) = countdown.tick(), if !countdown.is_finished() => {
                    ui.notify(TrialEvent::Countdown { phase: TrialPhase::Stimulus, remaining_secs });
                }
                () = ui.felt_stimulus(), if accepts_press && pressed_at.is_none() => {
                    pressed_at = Some(self.clock.now());
                    ui.notify(TrialEvent::FeltRecorded);
                }
            }
        }

        debug!("stimulus wait period passed");
        if audio_playing {
            ui.notify(TrialEvent::StopAudio);
        }
        pressed_at
    }

    fn clip_length<P: Participant>(&self, ui: &mut P, file: &str) -> Duration {
        ui.clip_duration(file).unwrap_or_else(|| {
            warn!(file, "audio clip length unknown, treating it as empty");
            Duration::ZERO
        })
    }
}

/// Trials with audio take their felt time from the clip, not from a press.
fn takes_press(phase: TrialPhase, trial: &Trial) -> bool {
    phase.allows_felt_input() && !trial.has_audio()
}

fn enter<P: Participant>(phase: TrialPhase, ui: &mut P) -> TrialPhase {
    let next = phase.next().unwrap_or(TrialPhase::Complete);
    ui.notify(TrialEvent::PhaseEntered(next));
    next
}
