use serde::{Deserialize, Serialize};

use crate::stimulus::Condition;

/// Marker for ratings the participant has not given.
pub const UNSET: i32 = -1;

/// One stimulus presentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trial {
    pub audio_file: Option<String>,
    pub condition: Condition,
    pub intensity: u32,
    /// Option of the external condition in effect, empty when none is configured.
    pub external_condition: String,
}

impl Trial {
    pub fn new(
        audio_file: Option<String>,
        condition: Condition,
        intensity: u32,
        external_condition: impl Into<String>,
    ) -> Self {
        Self {
            audio_file,
            condition,
            intensity,
            external_condition: external_condition.into(),
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_file.is_some()
    }
}

/// Recorded response per trial.
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub stimulus_started_at: f64,
    pub stimulus_felt_at: f64,
    pub temperature_felt: i32,
    pub comfort_level: i32,
    pub arousal: i32,
    pub valence: i32,
}

impl Default for UserResponse {
    fn default() -> Self {
        Self {
            stimulus_started_at: 0.0,
            stimulus_felt_at: 0.0,
            temperature_felt: 0,
            comfort_level: 0,
            arousal: UNSET,
            valence: UNSET,
        }
    }
}

/// Answer collected on the rating screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Likert {
        temperature_felt: i32,
        comfort_level: i32,
    },
    Manikin {
        arousal: i32,
        valence: i32,
    },
}

impl UserResponse {
    pub fn apply_rating(&mut self, rating: Rating) {
        match rating {
            Rating::Likert {
                temperature_felt,
                comfort_level,
            } => {
                self.temperature_felt = temperature_felt;
                self.comfort_level = comfort_level;
            }
            Rating::Manikin { arousal, valence } => {
                self.arousal = arousal;
                self.valence = valence;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_presence_follows_file() {
        let silent = Trial::new(None, Condition::Warm, 3, "");
        let audible = Trial::new(Some("rain.mp3".into()), Condition::Cool, 2, "on");
        assert!(!silent.has_audio());
        assert!(audible.has_audio());
    }

    #[test]
    fn fresh_response_has_unset_manikin_values() {
        let response = UserResponse::default();
        assert_eq!(response.arousal, UNSET);
        assert_eq!(response.valence, UNSET);
        assert_eq!(response.temperature_felt, 0);
    }

    #[test]
    fn ratings_only_touch_their_own_fields() {
        let mut response = UserResponse::default();
        response.apply_rating(Rating::Likert {
            temperature_felt: 70,
            comfort_level: 40,
        });
        assert_eq!(response.temperature_felt, 70);
        assert_eq!(response.comfort_level, 40);
        assert_eq!(response.arousal, UNSET);

        response.apply_rating(Rating::Manikin {
            arousal: 2,
            valence: 4,
        });
        assert_eq!(response.arousal, 2);
        assert_eq!(response.valence, 4);
        assert_eq!(response.temperature_felt, 70);
    }
}
