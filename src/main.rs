//! CLI Entry Point for freshtrack
//!
//! Provides command-line interface for:
//! - Running the tracker (sensor acquisition + periodic expiration recompute)
//! - One-shot expiration estimates
//! - Configuration validation
//!
//! # Usage
//!
//! ```bash
//! freshtrack run --config config/freshtrack.toml --simulate
//! freshtrack estimate --food-type DAIRY --entry-date 2024-01-01 --temperature 30
//! freshtrack check-config
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use freshtrack::acquisition::AcquiredSample;
use freshtrack::config::{FreshConfig, DEFAULT_CONFIG_PATH};
use freshtrack::engine::{estimate, resolve_policy};
use freshtrack::{logging, FreshTrack};
use freshtrack_core::AlertLevel;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "freshtrack")]
#[command(about = "Food inventory tracker with temperature-adjusted expiration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sensor acquisition and periodic recompute until Ctrl-C
    Run {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Start on the simulator for this run only (stored settings are left untouched)
        #[arg(long)]
        simulate: bool,
    },

    /// Estimate an expiration date without touching any inventory
    Estimate {
        /// Food type code (e.g. DAIRY)
        #[arg(long)]
        food_type: String,

        /// Entry date, YYYY-MM-DD
        #[arg(long)]
        entry_date: NaiveDate,

        /// Storage temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        temperature: f64,

        /// Classify as of this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Load and validate the configuration
    CheckConfig {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, simulate } => run(&config, simulate).await,
        Commands::Estimate {
            food_type,
            entry_date,
            temperature,
            today,
            config,
        } => estimate_once(&config, &food_type, entry_date, temperature, today),
        Commands::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: &Path) -> Result<FreshConfig> {
    let config = FreshConfig::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

async fn run(config_path: &Path, simulate: bool) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.sensor.force_simulation = simulate;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let service = FreshTrack::start(config)
        .await
        .context("failed to start FreshTrack")?;

    let mut samples = service.acquisition().subscribe();
    info!("FreshTrack running - press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = samples.recv() => match received {
                Ok(AcquiredSample { sample, alert }) => {
                    if alert == AlertLevel::None {
                        info!(
                            temperature = sample.temperature,
                            humidity = sample.humidity,
                            source = %sample.source,
                            "Sample"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Sample log lagging"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let status = service.status().await?;
    info!(connection = %status.connection, items = status.items, "Shutting down");
    service.shutdown().await;
    Ok(())
}

fn estimate_once(
    config_path: &Path,
    food_type: &str,
    entry_date: NaiveDate,
    temperature: f64,
    today: Option<NaiveDate>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let policies = config.food_policies()?;
    let policy = resolve_policy(&policies, food_type)?;
    let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());

    let result = estimate(
        policy,
        entry_date,
        temperature,
        &config.expiration.thresholds(),
        today,
    )?;

    println!("Food type:       {} ({})", policy.display_name(), result.type_code);
    println!("Base shelf life: {} days", policy.base_expiration_days());
    println!("Factor:          {}", result.factor);
    println!("Adjusted:        {} days", result.adjusted_days);
    println!("Expires:         {}", result.expiration_date);
    println!("Status:          {} (as of {})", result.status, today);
    Ok(())
}

fn check_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Configuration OK: {}", config_path.display());
    println!("  serial port:   {} @ {} baud", config.sensor.serial_port, config.sensor.baud_rate);
    println!("  simulation:    {}", config.sensor.simulation_mode);
    println!("  food types:    {}", config.food_types.len());
    println!(
        "  thresholds:    medium {} °C, high {} °C, warning window {} days",
        config.expiration.medium_threshold,
        config.expiration.high_threshold,
        config.expiration.warning_window_days
    );
    Ok(())
}
