//! Strata - headless simulation host
//!
//! Runs the demo scene on top of the strata entity/component index.
//! Usage: `strata [settings.toml]`

mod settings;
mod sim;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use settings::SimulationSettings;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting strata...");

    let settings = SimulationSettings::load(std::env::args_os().nth(1).map(PathBuf::from));
    info!(
        movers = settings.simulation.movers,
        static_bodies = settings.simulation.static_bodies,
        ticks = settings.simulation.ticks,
        family_keys = ?settings.world.family_keys,
        "Running simulation"
    );

    let summary = sim::run(&settings);
    info!(
        entities = summary.entities,
        movers = summary.movers,
        resting = summary.resting,
        families = summary.families,
        "Done after {} ticks",
        summary.ticks
    );
    Ok(())
}
