use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use thermowear_core::{Rating, Trial, TrialPhase, UNSET};
use thermowear_experiment::{Participant, QuestionType, TrialEvent};
use thermowear_timing::Countdown;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

const LIKERT_SCALE: RangeInclusive<i32> = 0..=100;
const MANIKIN_SCALE: RangeInclusive<i32> = 1..=5;

/// Participant at a terminal. Enter is the "I feel it" button.
pub struct ConsoleParticipant {
    lines: Lines<BufReader<Stdin>>,
    clip_lengths: HashMap<String, Duration>,
}

impl ConsoleParticipant {
    pub fn new(clip_lengths: HashMap<String, Duration>) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            clip_lengths,
        }
    }

    /// Next line from stdin, `None` once input is closed.
    async fn read_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "could not read from stdin");
                None
            }
        }
    }

    pub fn announce_trial(&self, number: usize, total: usize) {
        println!();
        println!("=== Trial {number} of {total} ===");
    }

    /// Scheduled break. Continuing is possible once the countdown ran out.
    pub async fn pause(&mut self, duration: Duration) {
        println!("Take a short break.");
        let mut countdown = Countdown::start(duration, Duration::from_secs(1));
        while let Some(remaining) = countdown.tick().await {
            println!("  {remaining}");
        }
        self.wait_for_continue().await;
    }

    /// Open-ended break while the experimenter changes the external condition.
    pub async fn switch_condition(&mut self, label: &str, next_option: &str) {
        println!("Please switch {label} to '{next_option}'.");
        self.wait_for_continue().await;
    }

    pub async fn wait_for_continue(&mut self) {
        println!("Press Enter to continue.");
        self.read_line().await;
    }

    async fn ask(&mut self, question: &str, scale: RangeInclusive<i32>) -> i32 {
        loop {
            println!("{question} [{}-{}]:", scale.start(), scale.end());
            let Some(line) = self.read_line().await else {
                warn!(question, "input closed before an answer was given");
                return UNSET;
            };
            match parse_answer(&line, &scale) {
                Some(value) => return value,
                None => println!("Please enter a whole number between {} and {}.", scale.start(), scale.end()),
            }
        }
    }
}

fn parse_answer(input: &str, scale: &RangeInclusive<i32>) -> Option<i32> {
    input
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|value| scale.contains(value))
}

/// Parses `FILE=SECONDS` as given on the command line.
pub fn parse_clip_length(arg: &str) -> Result<(String, Duration), String> {
    let (file, seconds) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected FILE=SECONDS, got '{arg}'"))?;
    let seconds: f64 = seconds
        .trim()
        .parse()
        .map_err(|_| format!("'{seconds}' is not a number of seconds"))?;
    if file.is_empty() || !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid clip length '{arg}'"));
    }
    let length =
        Duration::try_from_secs_f64(seconds).map_err(|_| format!("clip length '{arg}' is out of range"))?;
    Ok((file.to_string(), length))
}

impl Participant for ConsoleParticipant {
    fn notify(&mut self, event: TrialEvent) {
        match event {
            TrialEvent::PhaseEntered(TrialPhase::Adaptation) => println!("Adapting to the baseline temperature..."),
            TrialEvent::PhaseEntered(TrialPhase::Stimulus) => {
                println!("Stimulus on. Press Enter as soon as you feel a change.")
            }
            TrialEvent::PhaseEntered(TrialPhase::AwaitingFelt) => println!("Stimulus over."),
            TrialEvent::PhaseEntered(_) => {}
            TrialEvent::Countdown { phase, remaining_secs } if phase.shows_countdown() => {
                println!("  {remaining_secs}")
            }
            TrialEvent::Countdown { .. } => {}
            TrialEvent::Converged(convergence) if convergence.is_reached() => {
                println!("Target temperature reached.")
            }
            TrialEvent::Converged(_) => println!("Continuing without reaching the target."),
            TrialEvent::StartAudio { file } => println!("[audio] playing {file}"),
            TrialEvent::StopAudio => println!("[audio] stopped"),
            TrialEvent::FeltRecorded => println!("Noted."),
        }
    }

    fn clip_duration(&mut self, file: &str) -> Option<Duration> {
        self.clip_lengths.get(file).copied()
    }

    async fn felt_stimulus(&mut self) {
        if self.read_line().await.is_none() {
            warn!("input closed, recording the stimulus as felt");
        }
    }

    async fn rate(&mut self, _trial: &Trial, question_type: QuestionType) -> Rating {
        println!();
        match question_type {
            QuestionType::Likert => {
                let temperature_felt = self
                    .ask("How warm did it feel? (0 = very cool, 100 = very warm)", LIKERT_SCALE)
                    .await;
                let comfort_level = self
                    .ask("How comfortable was it? (0 = very uncomfortable, 100 = very comfortable)", LIKERT_SCALE)
                    .await;
                Rating::Likert {
                    temperature_felt,
                    comfort_level,
                }
            }
            QuestionType::Manikin => {
                let arousal = self.ask("Arousal (1 = calm, 5 = excited)", MANIKIN_SCALE).await;
                let valence = self.ask("Valence (1 = unpleasant, 5 = pleasant)", MANIKIN_SCALE).await;
                Rating::Manikin { arousal, valence }
            }
        }
    }
}
