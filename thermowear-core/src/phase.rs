/// Stages a single trial moves through, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialPhase {
    #[default]
    Baseline,
    Adaptation,
    Stimulus,
    AwaitingFelt,
    Rating,
    Complete,
}

impl TrialPhase {
    pub fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            Baseline => Adaptation,
            Adaptation => Stimulus,
            Stimulus => AwaitingFelt,
            AwaitingFelt => Rating,
            Rating => Complete,
            Complete => return None,
        })
    }

    /// The "I feel it" input is only accepted while the stimulus is on.
    pub fn allows_felt_input(&self) -> bool {
        matches!(self, Self::Stimulus | Self::AwaitingFelt)
    }

    pub fn shows_countdown(&self) -> bool {
        matches!(self, Self::Adaptation | Self::Stimulus)
    }
}
