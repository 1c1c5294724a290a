pub mod config;
pub mod error;
pub mod export;
pub mod protocol;
pub mod sequencer;
pub mod state;
pub mod trial;

pub use config::{ClipAlignment, ExperimentConfig, ExternalCondition, PauseSchedule, QuestionType, TrialDefinition};
pub use error::{ConfigError, ExperimentError, ExportError, SequencingError};
pub use export::{ExportRow, write_csv};
pub use protocol::{Participant, TrialEvent, TrialProtocol};
pub use sequencer::build_trials;
pub use state::{ExperimentRun, NextStep, RunState};
pub use trial::StimulusTiming;
