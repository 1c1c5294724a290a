use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thermowear_core::Condition;

use crate::error::ConfigError;

/// Parsed experiment file. Read-only for the lifetime of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    pub hostname: String,
    #[serde(rename = "baselineTemperature", alias = "baselineTemp", default = "default_baseline")]
    pub baseline_temp: i32,
    /// Seconds at baseline before each stimulus.
    #[serde(rename = "adaptationLength", alias = "adaptationPeriod", default = "default_period")]
    pub adaptation_period: u64,
    /// Seconds the stimulus is held. Zero means wait for the device instead.
    #[serde(rename = "stimulusLength", alias = "stimulusPeriod", default = "default_period")]
    pub stimulus_period: u64,
    #[serde(default)]
    pub clip_alignment: ClipAlignment,
    /// Seconds added to the computed audio start time.
    #[serde(default)]
    pub alignment_correction: f64,
    #[serde(default = "default_repetitions")]
    pub(crate) repetitions: i64,
    #[serde(default)]
    pub pauses: PauseSchedule,
    #[serde(default)]
    pub external_condition: Option<ExternalCondition>,
    #[serde(default)]
    pub question_type: QuestionType,
    /// Audio file pools keyed by tag, e.g. `positive` and `negative`.
    #[serde(default)]
    pub audio_files: BTreeMap<String, Vec<String>>,
    pub trials: Vec<TrialDefinition>,
}

fn default_baseline() -> i32 {
    32
}

fn default_period() -> u64 {
    20
}

fn default_repetitions() -> i64 {
    1
}

/// Where an audio clip sits inside the stimulus window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipAlignment {
    Start,
    #[default]
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Likert,
    Manikin,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseSchedule {
    /// Seconds before the participant may continue.
    #[serde(default)]
    pub duration: u64,
    /// Zero-based trial indices after which the experiment pauses.
    #[serde(default)]
    pub pause_after: BTreeSet<usize>,
}

/// A variable the experimenter changes by hand between blocks, e.g. whether
/// the fabric is worn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalCondition {
    pub label: String,
    pub options: Vec<String>,
}

/// One entry of the `trials` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDefinition {
    pub condition: Condition,
    #[serde(default)]
    pub intensity: u32,
    #[serde(default)]
    pub audio_file: Option<String>,
    /// Tag of the audio pool to draw from when no file is given.
    #[serde(default)]
    pub audio_type: Option<String>,
}

impl TrialDefinition {
    pub fn new(condition: Condition, intensity: u32) -> Self {
        Self {
            condition,
            intensity,
            audio_file: None,
            audio_type: None,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            hostname: "http://localhost:5000".to_string(),
            baseline_temp: default_baseline(),
            adaptation_period: default_period(),
            stimulus_period: default_period(),
            clip_alignment: ClipAlignment::default(),
            alignment_correction: 0.0,
            repetitions: default_repetitions(),
            pauses: PauseSchedule::default(),
            external_condition: None,
            question_type: QuestionType::default(),
            audio_files: BTreeMap::new(),
            trials: Vec::new(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("hostname is empty".into()));
        }
        if let Some(external) = &self.external_condition {
            if external.options.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "external condition '{}' has no options",
                    external.label
                )));
            }
        }
        Ok(())
    }

    /// Number of times the trial list is repeated. Values below one count as one.
    pub fn repetitions(&self) -> usize {
        self.repetitions.max(1) as usize
    }

    pub fn with_repetitions(mut self, repetitions: i64) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn adaptation_duration(&self) -> Duration {
        Duration::from_secs(self.adaptation_period)
    }

    pub fn stimulus_duration(&self) -> Duration {
        Duration::from_secs(self.stimulus_period)
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pauses.duration)
    }
}
