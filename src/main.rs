//! Wa-Tor - Entry Point
//!
//! Runs the simulation loop headless and logs each round. Snapshots are
//! summarized as occupancy lines; image output is left to other tools.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use clap::Parser;
use wator::core::types::CellState;
use wator::{Result, SimulationEvent, SimulationLoop, WatorConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wa-Tor predator-prey simulation on a torus
#[derive(Parser, Debug)]
#[command(name = "wator")]
#[command(about = "Run a parallel Wa-Tor simulation and report per-round populations")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// World width in cells
    #[arg(long)]
    width: Option<usize>,

    /// World height in cells
    #[arg(long)]
    height: Option<usize>,

    /// Initial prey count
    #[arg(long)]
    prey: Option<usize>,

    /// Initial predator count
    #[arg(long)]
    predators: Option<usize>,

    /// Random seed for reproducible placement
    #[arg(long)]
    seed: Option<u64>,

    /// Workers per logical processor
    #[arg(long)]
    worker_factor: Option<usize>,

    /// Stop after this many rounds
    #[arg(long, default_value_t = 100)]
    rounds: u64,

    /// Write one JSON line per round summary to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<(WatorConfig, u64, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => WatorConfig::load(path)?,
            None => WatorConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(prey) = self.prey {
            config.initial_prey = prey;
        }
        if let Some(predators) = self.predators {
            config.initial_predators = predators;
        }
        if let Some(factor) = self.worker_factor {
            config.worker_factor = factor;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        Ok((config, self.rounds, self.summary_json))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wator=info")),
        )
        .init();

    let (config, rounds, summary_path) = Args::parse().into_config()?;
    config.validate()?;
    config.check_capacity()?;

    tracing::info!(
        width = config.width,
        height = config.height,
        prey = config.initial_prey,
        predators = config.initial_predators,
        "Wa-Tor starting"
    );

    let mut summary_out = match summary_path {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut sim_loop = SimulationLoop::new(config)?.with_round_limit(rounds);
    let events = sim_loop.events().ok_or(wator::WatorError::ControlThreadPanicked)?;
    sim_loop.start()?;

    loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => report(event, summary_out.as_mut())?,
            Err(RecvTimeoutError::Timeout) if !sim_loop.is_running() => {
                // Everything sent before the halt is already queued
                for event in events.try_iter() {
                    report(event, summary_out.as_mut())?;
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    sim_loop.join()?;
    if let Some(mut out) = summary_out {
        out.flush()?;
    }

    if let Some(simulation) = sim_loop.simulation() {
        let census = simulation.census();
        println!(
            "Finished after {} rounds: {} prey, {} predators",
            simulation.round(),
            census.prey,
            census.predators
        );
    }
    Ok(())
}

fn report(event: SimulationEvent, summary_out: Option<&mut BufWriter<File>>) -> Result<()> {
    match event {
        SimulationEvent::RoundCompleted(summary) => {
            tracing::info!(
                round = summary.round,
                prey = summary.prey,
                predators = summary.predators,
                elapsed_ms = summary.elapsed_ms(),
                "round"
            );
            if let Some(out) = summary_out {
                serde_json::to_writer(&mut *out, &summary)?;
                out.write_all(b"\n")?;
            }
        }
        SimulationEvent::Snapshot(snapshot) => {
            let round = snapshot.round();
            let cells = snapshot.len();
            let (mut prey, mut predators) = (0usize, 0usize);
            for (_, state) in snapshot {
                match state {
                    CellState::Prey => prey += 1,
                    CellState::Predator => predators += 1,
                    CellState::Water => {}
                }
            }
            tracing::debug!(round, cells, prey, predators, "occupancy");
        }
        SimulationEvent::Extinct { round } => {
            println!("All agents extinct after round {}", round);
        }
    }
    Ok(())
}
