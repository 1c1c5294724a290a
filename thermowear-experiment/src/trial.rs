use std::time::Duration;

use crate::config::{ClipAlignment, ExperimentConfig};

/// Per-trial durations taken from the experiment file.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusTiming {
    pub adaptation: Duration,
    pub stimulus: Duration,
    pub alignment: ClipAlignment,
    pub correction_ms: i64,
}

impl From<&ExperimentConfig> for StimulusTiming {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            adaptation: config.adaptation_duration(),
            stimulus: config.stimulus_duration(),
            alignment: config.clip_alignment,
            correction_ms: (config.alignment_correction * 1000.0).round() as i64,
        }
    }
}

impl StimulusTiming {
    /// A zero stimulus period holds the stimulus until the device reports the target.
    pub fn waits_for_convergence(&self) -> bool {
        self.stimulus.is_zero()
    }

    /// Delay between stimulus onset and the start of an audio clip of
    /// length `clip`. Clips longer than the stimulus start at the correction.
    pub fn audio_start_offset(&self, clip: Duration) -> Duration {
        let clip_ms = clip.as_millis() as i64;
        let stimulus_ms = self.stimulus.as_millis() as i64;
        let correction = self.correction_ms;

        let start_ms = if clip_ms > stimulus_ms {
            correction
        } else {
            match self.alignment {
                ClipAlignment::Center => {
                    (stimulus_ms as f64 / 2.0 - clip_ms as f64 / 2.0).floor() as i64 + correction
                }
                ClipAlignment::End => stimulus_ms - clip_ms + correction,
                ClipAlignment::Start => correction,
            }
        };

        Duration::from_millis(start_ms.max(0) as u64)
    }
}
