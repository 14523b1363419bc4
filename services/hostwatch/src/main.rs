//! Hostwatch CLI
//!
//! Command-line interface for the host stats and error notification service.

use std::path::PathBuf;

use clap::Parser;
use hostwatch::config::ReportMode;
use hostwatch::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "hostwatch")]
#[command(about = "Host stats and error notification service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Print error reports locally instead of delivering them
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, log_level={:?}, print={}",
        args.config,
        args.log_level,
        args.print
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.apply_env_overrides()?;

    if args.print {
        config.reporter.mode = ReportMode::Local;
    }

    tracing::info!("Starting hostwatch service");
    tracing::debug!(
        "Reporter mode: {:?}, stats every {} minute(s)",
        config.reporter.mode,
        config.stats.interval_minutes
    );

    hostwatch::run(config).await?;

    Ok(())
}
