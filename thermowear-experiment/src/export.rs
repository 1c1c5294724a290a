//! CSV export of a finished run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thermowear_core::{Trial, UserResponse};
use tracing::info;

use crate::error::ExportError;

pub const HEADER: &str = "trial,participant,condition,intensity,external_condition,audio_file,\
stimulus_started,stimulus_felt,temperature_felt,comfort_level,arousal,valence";

/// One trial paired with its response.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// 1-based position in the run.
    pub ordinal: usize,
    pub participant_id: String,
    pub condition: String,
    pub intensity: u32,
    pub external_condition: String,
    pub audio_file: String,
    pub stimulus_started_at: f64,
    pub stimulus_felt_at: f64,
    pub temperature_felt: i32,
    pub comfort_level: i32,
    pub arousal: i32,
    pub valence: i32,
}

impl ExportRow {
    pub fn new(ordinal: usize, participant_id: &str, trial: &Trial, response: &UserResponse) -> Self {
        Self {
            ordinal,
            participant_id: participant_id.to_string(),
            condition: trial.condition.to_string(),
            intensity: trial.intensity,
            external_condition: trial.external_condition.clone(),
            audio_file: trial.audio_file.clone().unwrap_or_default(),
            stimulus_started_at: response.stimulus_started_at,
            stimulus_felt_at: response.stimulus_felt_at,
            temperature_felt: response.temperature_felt,
            comfort_level: response.comfort_level,
            arousal: response.arousal,
            valence: response.valence,
        }
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{:.2},{:.2},{},{},{},{}",
            self.ordinal,
            escape(&self.participant_id),
            escape(&self.condition),
            self.intensity,
            escape(&self.external_condition),
            escape(&self.audio_file),
            self.stimulus_started_at,
            self.stimulus_felt_at,
            self.temperature_felt,
            self.comfort_level,
            self.arousal,
            self.valence,
        )
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::with_capacity(HEADER.len() + rows.len() * 96);
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{}", row.to_csv_line());
    }
    out
}

/// First free file name for the participant: `P1.csv`, then `P1_01.csv`,
/// `P1_02.csv` and so on.
pub fn unique_path(dir: &Path, participant_id: &str) -> PathBuf {
    let first = dir.join(format!("{participant_id}.csv"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{participant_id}_{n:02}.csv")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Writes the rows into `dir` without overwriting earlier exports and returns
/// the path written.
pub fn write_csv(dir: &Path, participant_id: &str, rows: &[ExportRow]) -> Result<PathBuf, ExportError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExportError::Io { path, source }
    };

    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = unique_path(dir, participant_id);
    std::fs::write(&path, render_csv(rows)).map_err(io_error(&path))?;

    info!(path = %path.display(), rows = rows.len(), "responses exported");
    Ok(path)
}
