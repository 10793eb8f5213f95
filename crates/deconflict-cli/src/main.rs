//! Validate one drone mission against scheduled traffic.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use deconflict_cli::{Config, Scenario};
use deconflict_core::ConflictEngine;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (JSON) with a mission and its surrounding traffic
    scenario: Option<PathBuf>,

    /// Generate this many random traffic missions instead of reading a file
    #[arg(long, conflicts_with = "scenario")]
    random: Option<usize>,

    /// Seed for --random
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Minimum separation in meters
    #[arg(long)]
    safety_buffer: Option<f64>,

    /// Temporal buffer in seconds
    #[arg(long)]
    temporal_buffer_secs: Option<i64>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deconflict=info".parse()?)
                .add_directive("deconflict_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let scenario = match (&args.scenario, args.random) {
        (Some(path), _) => Scenario::load(path)?,
        (None, Some(count)) => Scenario::random(count, args.seed, Utc::now())?,
        (None, None) => bail!("provide a scenario file or --random <COUNT>"),
    };
    tracing::info!(
        "Loaded mission {} with {} traffic mission(s)",
        scenario.mission.id(),
        scenario.traffic.len()
    );

    let mut rules = scenario.rules.clone().unwrap_or_else(|| config.rules());
    if let Some(buffer) = args.safety_buffer {
        rules.safety_buffer_m = buffer;
    }
    if let Some(secs) = args.temporal_buffer_secs {
        rules.temporal_buffer_secs = secs;
    }

    let mut engine = ConflictEngine::new(rules).context("invalid safety rules")?;
    engine
        .register_all(scenario.traffic)
        .context("failed to register traffic")?;
    let result = engine
        .validate_mission(&scenario.mission)
        .context("failed to validate mission")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{result}");
    }

    Ok(if result.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
