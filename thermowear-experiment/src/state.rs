use std::time::Duration;

use rand::Rng;
use thermowear_core::{Rating, Trial, UserResponse};
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, ExportError};
use crate::export::ExportRow;
use crate::sequencer::build_trials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running { cursor: usize },
    Complete,
}

/// What the participant sees after rating a trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Scheduled break; continuing is allowed once `duration` has passed.
    Pause { duration: Duration },
    /// Break without a countdown while the experimenter switches the
    /// external condition to `next_option`.
    SwitchExternalCondition { next_option: String },
    NextTrial,
    Finished,
}

/// One participant's session: the trial list, a cursor into it and the
/// responses recorded so far.
///
/// The cursor only moves forward. It equals the number of trials once the
/// run is complete.
#[derive(Debug)]
pub struct ExperimentRun {
    config: ExperimentConfig,
    participant_id: String,
    counterbalance: usize,
    trials: Vec<Trial>,
    responses: Vec<Option<UserResponse>>,
    cursor: usize,
}

impl ExperimentRun {
    /// Builds the trial list and starts at the first trial.
    pub fn new<R: Rng + ?Sized>(
        config: ExperimentConfig,
        participant_id: impl Into<String>,
        counterbalance: usize,
        first_option: Option<&str>,
        rng: &mut R,
    ) -> Result<Self, ExperimentError> {
        let trials = build_trials(&config, first_option, counterbalance, rng)?;
        Ok(Self::from_trials(config, participant_id, counterbalance, trials))
    }

    /// Starts a run over an already built trial list.
    pub fn from_trials(
        config: ExperimentConfig,
        participant_id: impl Into<String>,
        counterbalance: usize,
        trials: Vec<Trial>,
    ) -> Self {
        let run = Self {
            config,
            participant_id: participant_id.into(),
            counterbalance,
            responses: Vec::with_capacity(trials.len()),
            trials,
            cursor: 0,
        };
        info!(
            host = %run.config.hostname,
            participant = %run.participant_id,
            counterbalance = run.counterbalance,
            trials = run.trials.len(),
            "experiment run ready"
        );
        run
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> RunState {
        if self.cursor >= self.trials.len() {
            RunState::Complete
        } else {
            RunState::Running {
                cursor: self.cursor,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RunState::Complete
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.trials.get(self.cursor)
    }

    /// Response for the current trial, created on first access.
    /// `None` once the run is complete.
    pub fn current_response(&mut self) -> Option<&mut UserResponse> {
        if self.cursor >= self.trials.len() {
            return None;
        }
        if self.responses.len() <= self.cursor {
            self.responses.resize_with(self.cursor + 1, || None);
        }
        Some(self.responses[self.cursor].get_or_insert_with(UserResponse::default))
    }

    pub fn record_rating(&mut self, rating: Rating) -> Result<(), ExperimentError> {
        let response = self.current_response().ok_or(ExperimentError::RunComplete)?;
        response.apply_rating(rating);
        Ok(())
    }

    /// Moves to the next trial. Callers stop once the run is complete.
    pub fn advance(&mut self) {
        self.cursor += 1;
        debug!(cursor = self.cursor, total = self.trials.len(), "advanced trial cursor");
    }

    /// 1-based number of the current trial and the total, for display.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.current_trial()
            .map(|_| (self.cursor + 1, self.trials.len()))
    }

    /// Whether a break is scheduled after the trial just completed. Call after
    /// [`advance`](Self::advance).
    ///
    /// The schedule lists indices of the trials as written in the experiment
    /// file, but it is compared with the position in the shuffled and repeated
    /// sequence. The two only agree for unshuffled single-repetition runs.
    pub fn should_pause_after_current(&self) -> bool {
        self.cursor
            .checked_sub(1)
            .is_some_and(|completed| self.config.pauses.pause_after.contains(&completed))
    }

    /// Whether the run sits exactly halfway, where the external condition flips.
    pub fn should_switch_external_condition(&self) -> bool {
        self.config.external_condition.is_some() && self.cursor == self.trials.len() / 2
    }

    /// Navigation decision after a trial was rated and the cursor advanced.
    pub fn next_step(&self) -> NextStep {
        if self.should_pause_after_current() {
            NextStep::Pause {
                duration: self.config.pause_duration(),
            }
        } else if self.should_switch_external_condition() {
            NextStep::SwitchExternalCondition {
                next_option: self
                    .current_trial()
                    .map(|trial| trial.external_condition.clone())
                    .unwrap_or_default(),
            }
        } else if self.is_complete() {
            NextStep::Finished
        } else {
            NextStep::NextTrial
        }
    }

    /// Pairs every trial with its response. Fails if any trial has no response.
    pub fn export_rows(&self) -> Result<Vec<ExportRow>, ExportError> {
        self.trials
            .iter()
            .enumerate()
            .map(|(index, trial)| {
                let response = self
                    .responses
                    .get(index)
                    .and_then(Option::as_ref)
                    .ok_or(ExportError::MissingResponse { index })?;
                Ok(ExportRow::new(index + 1, &self.participant_id, trial, response))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExternalCondition, PauseSchedule, TrialDefinition};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use thermowear_core::{Condition, UNSET};

    fn trials(n: usize) -> Vec<Trial> {
        (0..n)
            .map(|i| Trial::new(None, Condition::Warm, i as u32, ""))
            .collect()
    }

    fn run_of(n: usize, config: ExperimentConfig) -> ExperimentRun {
        ExperimentRun::from_trials(config, "P1", 0, trials(n))
    }

    #[test]
    fn advancing_through_all_trials_completes() {
        let mut run = run_of(3, ExperimentConfig::default());
        for i in 0..3 {
            assert_eq!(run.state(), RunState::Running { cursor: i });
            assert_eq!(run.current_trial().unwrap().intensity, i as u32);
            run.advance();
        }
        assert_eq!(run.state(), RunState::Complete);
        assert!(run.current_trial().is_none());
        assert!(run.progress().is_none());
    }

    #[test]
    fn responses_are_created_once_per_trial() {
        let mut run = run_of(2, ExperimentConfig::default());
        run.current_response().unwrap().stimulus_started_at = 12.5;
        assert_eq!(run.current_response().unwrap().stimulus_started_at, 12.5);
        assert_eq!(run.current_response().unwrap().arousal, UNSET);

        run.advance();
        assert_eq!(run.current_response().unwrap().stimulus_started_at, 0.0);

        run.advance();
        assert!(run.current_response().is_none());
        assert!(run.responses.len() <= run.trials.len());
    }

    #[test]
    fn ratings_land_in_current_response() {
        let mut run = run_of(1, ExperimentConfig::default());
        run.record_rating(Rating::Likert {
            temperature_felt: 55,
            comfort_level: 20,
        })
        .unwrap();
        assert_eq!(run.current_response().unwrap().comfort_level, 20);

        run.advance();
        let err = run
            .record_rating(Rating::Manikin { arousal: 1, valence: 1 })
            .unwrap_err();
        assert!(matches!(err, ExperimentError::RunComplete));
    }

    #[test]
    fn pause_checks_the_trial_just_completed() {
        let config = ExperimentConfig {
            pauses: PauseSchedule {
                duration: 30,
                pause_after: [1, 3].into_iter().collect(),
            },
            ..Default::default()
        };
        let mut run = run_of(5, config);
        assert!(!run.should_pause_after_current());

        let mut pauses = Vec::new();
        for _ in 0..5 {
            run.advance();
            pauses.push(run.should_pause_after_current());
        }
        assert_eq!(pauses, vec![false, true, false, true, false]);
    }

    #[test]
    fn switch_happens_at_midpoint_only_with_external_condition() {
        let external = ExperimentConfig {
            external_condition: Some(ExternalCondition {
                label: "Fabric".into(),
                options: vec!["on".into(), "off".into()],
            }),
            ..Default::default()
        };
        let mut run = run_of(6, external);
        let mut switches = Vec::new();
        for _ in 0..6 {
            run.advance();
            switches.push(run.should_switch_external_condition());
        }
        assert_eq!(switches, vec![false, false, true, false, false, false]);

        let mut plain = run_of(6, ExperimentConfig::default());
        for _ in 0..3 {
            plain.advance();
        }
        assert!(!plain.should_switch_external_condition());
    }

    #[test]
    fn next_step_prefers_pause_then_switch_then_finish() {
        let config = ExperimentConfig {
            trials: vec![
                TrialDefinition::new(Condition::Cool, 2),
                TrialDefinition::new(Condition::Warm, 2),
            ],
            pauses: PauseSchedule {
                duration: 45,
                pause_after: [0].into_iter().collect(),
            },
            external_condition: Some(ExternalCondition {
                label: "Fabric".into(),
                options: vec!["on".into(), "off".into()],
            }),
            ..Default::default()
        };
        let mut run =
            ExperimentRun::new(config, "P7", 0, Some("on"), &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(run.trials().len(), 4);

        run.advance();
        assert_eq!(
            run.next_step(),
            NextStep::Pause {
                duration: Duration::from_secs(45)
            }
        );

        run.advance();
        assert_eq!(
            run.next_step(),
            NextStep::SwitchExternalCondition {
                next_option: "off".into()
            }
        );

        run.advance();
        assert_eq!(run.next_step(), NextStep::NextTrial);

        run.advance();
        assert_eq!(run.next_step(), NextStep::Finished);
    }

    #[test]
    fn sequencing_errors_abort_construction() {
        let config = ExperimentConfig {
            trials: vec![TrialDefinition::new(Condition::Cool, 2)],
            ..Default::default()
        };
        let err = ExperimentRun::new(config, "P1", 3, None, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, ExperimentError::Sequencing(_)));
    }

    #[test]
    fn export_needs_every_response() {
        let mut run = run_of(3, ExperimentConfig::default());
        run.current_response();
        run.advance();
        run.advance();
        run.current_response();
        run.advance();

        let err = run.export_rows().unwrap_err();
        assert!(matches!(err, ExportError::MissingResponse { index: 1 }));
    }

    #[test]
    fn export_pairs_trials_with_responses() {
        let mut run = run_of(2, ExperimentConfig::default());
        for felt in [100.0, 200.0] {
            run.current_response().unwrap().stimulus_felt_at = felt;
            run.advance();
        }

        let rows = run.export_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ordinal, 1);
        assert_eq!(rows[1].ordinal, 2);
        assert_eq!(rows[1].intensity, 1);
        assert_eq!(rows[1].stimulus_felt_at, 200.0);
        assert_eq!(rows[0].participant_id, "P1");
    }
}
