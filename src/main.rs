//! Console driver for thermal perception experiments.
//!
//! Loads an experiment file, checks that the heating element answers, runs
//! every trial with the participant at this terminal and writes the responses
//! to `<participant>.csv`.

mod console;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thermowear_device::{HeatingElement, HttpTransport};
use thermowear_experiment::{
    ExperimentConfig, ExperimentRun, NextStep, StimulusTiming, TrialProtocol, write_csv,
};
use thermowear_timing::MonotonicClock;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use console::{ConsoleParticipant, parse_clip_length};

#[derive(Parser)]
#[command(name = "thermowear")]
#[command(version)]
#[command(about = "Thermal stimulus experiments with a wearable heating element")]
struct Cli {
    /// Experiment file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Participant identifier, also names the export file
    #[arg(short, long)]
    participant: String,

    /// Index of the trial each block starts with
    #[arg(long, default_value = "0")]
    counterbalance: usize,

    /// External-condition option to run first
    #[arg(long)]
    external_condition: Option<String>,

    /// Directory the responses are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Random seed for a reproducible trial order
    #[arg(long)]
    seed: Option<u64>,

    /// Heating element address, overrides the experiment file
    #[arg(long, env = "THERMOWEAR_HOST")]
    host: Option<String>,

    /// Audio clip length as FILE=SECONDS, may be repeated
    #[arg(long = "clip-length", value_parser = parse_clip_length)]
    clip_lengths: Vec<(String, Duration)>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = ExperimentConfig::load(&cli.config)
        .with_context(|| format!("failed to load experiment from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.hostname = host;
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut run = ExperimentRun::new(
        config,
        cli.participant,
        cli.counterbalance,
        cli.external_condition.as_deref(),
        &mut rng,
    )
    .context("failed to build the trial sequence")?;

    let element = HeatingElement::new(
        HttpTransport::new(&run.config().hostname),
        run.config().baseline_temp,
    );
    element
        .probe()
        .await
        .with_context(|| format!("heating element at {} is not reachable", run.config().hostname))?;

    let protocol = TrialProtocol::new(&element, MonotonicClock::new(), StimulusTiming::from(run.config()));
    let mut participant = ConsoleParticipant::new(cli.clip_lengths.into_iter().collect::<HashMap<_, _>>());

    participant.wait_for_continue().await;

    while let Some((number, total)) = run.progress() {
        participant.announce_trial(number, total);
        protocol.run_current_trial(&mut run, &mut participant).await?;
        run.advance();

        match run.next_step() {
            NextStep::Pause { duration } => {
                info!(after_trial = number, secs = duration.as_secs(), "scheduled pause");
                participant.pause(duration).await;
            }
            NextStep::SwitchExternalCondition { next_option } => {
                let label = run
                    .config()
                    .external_condition
                    .as_ref()
                    .map(|external| external.label.as_str())
                    .unwrap_or("the external condition");
                info!(%label, %next_option, "switching external condition");
                participant.switch_condition(label, &next_option).await;
            }
            NextStep::NextTrial => {}
            NextStep::Finished => break,
        }
    }

    let rows = run.export_rows().context("responses are incomplete")?;
    for row in &rows {
        debug!(?row, "response");
    }
    let path = write_csv(&cli.output_dir, run.participant_id(), &rows)
        .context("failed to export responses")?;

    info!(
        path = %path.display(),
        finished = %Local::now().format("%Y-%m-%d %H:%M:%S"),
        "experiment complete"
    );
    println!("Thank you for participating!");

    Ok(())
}
