use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use swarmsim_app::{RunOptions, run, run_for_ticks};
use swarmsim_core::{AgentKind, SwarmConfig, SwarmWorld};
use tracing::info;

/// Headless swarm simulation runner.
#[derive(Debug, Parser)]
#[command(name = "swarmsim", version, about)]
struct Cli {
    /// RNG seed override for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock run duration in seconds.
    #[arg(long, default_value_t = 20.0)]
    duration: f64,

    /// Simulation tick rate in Hz.
    #[arg(long, default_value_t = 24.0)]
    tick_hz: f64,

    /// Run exactly this many ticks as fast as possible instead of pacing
    /// against the wall clock.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// JSON configuration overlay; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticks between logged summaries; 0 disables them.
    #[arg(long, default_value_t = 24)]
    summary_interval: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    ensure!(cli.duration >= 0.0, "duration must be non-negative");
    ensure!(cli.tick_hz > 0.0, "tick rate must be positive");

    let config = load_config(&cli)?;
    let mut world = SwarmWorld::new(config).context("configuration rejected")?;
    world.seed_population();
    info!(
        species_a = world.alive_count(Some(AgentKind::SpeciesA)),
        species_b = world.alive_count(Some(AgentKind::SpeciesB)),
        food = world.alive_count(Some(AgentKind::FoodSource)),
        "seeded population",
    );

    let report = match cli.max_ticks {
        Some(max_ticks) => run_for_ticks(&mut world, max_ticks, cli.summary_interval),
        None => {
            let options = RunOptions {
                duration: Duration::from_secs_f64(cli.duration),
                tick_interval: Duration::from_secs_f64(1.0 / cli.tick_hz),
                summary_interval: cli.summary_interval,
            };
            run(&mut world, &options)
        }
    };

    info!(
        ticks = report.ticks,
        species_a = report.species_a,
        species_b = report.species_b,
        food = report.food_sources,
        feedings = report.feedings,
        deaths = report.deaths,
        "run complete",
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<SwarmConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening config file {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => SwarmConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    Ok(config)
}
