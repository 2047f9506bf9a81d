//! LicenseHub housekeeping daemon
//!
//! Usage:
//!   licensehubd --config licensehub.toml migrate
//!   licensehubd monthly-reset --as-of 2025-02-01
//!   licensehubd prune
//!   licensehubd sweep

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use licensehub_db::{Store, latest_version};
use licensehub_entitlement::{Entitlements, LicenseHubConfig};
use licensehubd::{SweepReport, run_sweeper};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "licensehubd")]
#[command(about = "LicenseHub housekeeping daemon")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "licensehub.toml")]
    config: PathBuf,

    /// Override the database path from the config file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Reset credits for every license whose period has ended
    MonthlyReset {
        /// Treat this date (YYYY-MM-DD) as today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Delete rate-limit samples outside the window
    Prune,
    /// Run monthly reset and prune on an interval until Ctrl-C
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = LicenseHubConfig::try_load_from(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    config.apply_env_overrides();
    if let Some(database) = args.database {
        config.database_path = database;
    }

    match args.command {
        Command::Migrate => {
            let store = Store::open(&config.database_path).with_context(|| {
                format!("opening database {}", config.database_path.display())
            })?;
            let version = store.schema_version()?;
            info!(version, latest = latest_version(), "Schema is up to date");
        }
        Command::MonthlyReset { as_of } => {
            let hub = open_hub(&config)?;
            let as_of = as_of.unwrap_or_else(|| hub.today());
            let licenses_reset = hub.run_monthly_reset(as_of)?;
            print_report(&SweepReport {
                as_of,
                licenses_reset,
                samples_pruned: 0,
            })?;
        }
        Command::Prune => {
            let hub = open_hub(&config)?;
            let samples_pruned = hub.prune_rate_samples()?;
            print_report(&SweepReport {
                as_of: hub.today(),
                licenses_reset: 0,
                samples_pruned,
            })?;
        }
        Command::Sweep => {
            let hub = Arc::new(open_hub(&config)?);
            info!(
                interval = ?config.sweep_interval(),
                database = %config.database_path.display(),
                "Sweeper running"
            );
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            run_sweeper(hub, config.sweep_interval(), shutdown).await;
        }
    }

    Ok(())
}

fn open_hub(config: &LicenseHubConfig) -> Result<Entitlements> {
    Entitlements::open(config)
        .with_context(|| format!("opening database {}", config.database_path.display()))
}

fn print_report(report: &SweepReport) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
