use std::path::PathBuf;

use thermowear_device::DeviceError;
use thiserror::Error;

/// The experiment file is missing or malformed. Fatal before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read experiment file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse experiment: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid experiment: {0}")]
    Invalid(String),
}

/// The trial list cannot be built. No partial list is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("counterbalance index {index} is out of range for {len} trials")]
    CounterbalanceOutOfRange { index: usize, len: usize },
    #[error("audio pool '{tag}' ran out of files")]
    AudioPoolExhausted { tag: String },
    #[error("'{option}' is not an option of external condition '{label}'")]
    UnknownExternalCondition { label: String, option: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no response recorded for trial {}", .index + 1)]
    MissingResponse { index: usize },
    #[error("could not write responses to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sequencing(#[from] SequencingError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("the experiment has no trials left")]
    RunComplete,
}
