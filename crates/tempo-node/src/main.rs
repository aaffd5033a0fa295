//! tempo binary
//!
//! Runs an in-memory cluster and prints the report as JSON.

mod cli;

use anyhow::Result;
use cli::Cli;
use std::time::Duration;
use tempo_node::{SimConfig, Simulation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr so stdout carries only the report
    let plain = (!cli.log_json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json = cli
        .log_json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();

    tracing::info!("tempo simulation starting...");

    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    cli.apply(&mut config);

    let duration = Duration::from_secs(config.duration_secs);
    let simulation = Simulation::new(config)?;

    // Ctrl+C ends the run early but still reports
    let report = simulation
        .run_until(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
            }
        })
        .await?;

    println!("{}", report.to_json()?);

    if !report.check_commit_safety() {
        anyhow::bail!("replicas committed conflicting blocks");
    }

    tracing::info!("tempo simulation stopped");

    Ok(())
}
