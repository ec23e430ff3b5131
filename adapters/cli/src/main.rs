#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays a Horde stage without a game engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use horde_cli::{Scenario, Simulation};
use tracing_subscriber::EnvFilter;

/// Replays a survivors stage headlessly and prints a summary.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario file to load. The bundled meadow stage is used when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Overrides the scenario seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides the number of simulated ticks.
    #[arg(long)]
    ticks: Option<u32>,
    /// Overrides the tick length in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,
}

impl Cli {
    fn apply_overrides(&self, scenario: &mut Scenario) {
        if let Some(seed) = self.seed {
            scenario.simulation.seed = seed;
        }
        if let Some(ticks) = self.ticks {
            scenario.simulation.ticks = ticks;
        }
        if let Some(tick_ms) = self.tick_ms {
            scenario.simulation.tick_ms = tick_ms;
        }
    }
}

/// Entry point for the Horde command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => Scenario::builtin().context("bundled scenario is invalid")?,
    };
    cli.apply_overrides(&mut scenario);
    anyhow::ensure!(scenario.simulation.tick_ms > 0, "tick length must be positive");

    let ticks = scenario.simulation.ticks;
    let mut simulation = Simulation::new(scenario).context("failed to start the simulation")?;
    let report = simulation.run(ticks);
    print!("{report}");
    Ok(())
}
