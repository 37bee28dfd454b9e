//! # tiersync
//!
//! Entry point for the tiersync CLI.
//!
//! ## Run Sequence
//!
//! 1. **Load** - Read the policy file and validate every section
//! 2. **Connect** - Build the REST client for the configured store
//! 3. **Reconcile** - Snapshot policies, then push and pull replications
//! 4. **Report** - Print one JSON document on stdout
//!
//! ## Error Handling
//!
//! Failures are printed as a JSON error document with a semantic exit code
//! (1 validation or config, 2 missing snapshot tasks, 3 remote store, 4 other).
//! Logs go to stderr so stdout stays machine-readable.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tiersync::cli::{Cli, Commands};
use tiersync::json::{JsonError, JsonSerializable, JsonSuccess};
use tiersync::tiersync_core::{ExecutionMode, Tier};
use tiersync::{HttpStore, PolicyFile, RunReport, Runner};

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let json_error = JsonError::from_anyhow(&err);
            if let Ok(json) = json_error.to_json() {
                println!("{json}");
            }
            u8::try_from(json_error.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
        }
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn dispatch(command: &Commands) -> Result<()> {
    match command {
        Commands::Apply { config } => print(&reconcile(config, ExecutionMode::Apply)?),
        Commands::Plan { config } => print(&reconcile(config, ExecutionMode::Check)?),
        Commands::Tiers => print(&TierListing::catalog()),
    }
}

/// Load, validate and reconcile every policy in `path`.
fn reconcile(path: &Path, mode: ExecutionMode) -> Result<RunReport> {
    let file = PolicyFile::from_file(path)
        .with_context(|| format!("Failed to load policy file {}", path.display()))?;
    let policies = file.policies().context("Invalid policy")?;
    info!(path = %path.display(), policies = policies.len(), "Policies validated");

    let store = HttpStore::new(&file.store).context("Failed to set up the store client")?;
    let report = Runner::new(&store, mode)
        .run(&policies)
        .context("Reconciliation failed")?;
    Ok(report)
}

fn print<T: Serialize>(data: &T) -> Result<()> {
    let json = JsonSuccess::new(data)
        .to_json()
        .context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct TierEntry {
    tier: Tier,
    schedule: String,
    unit: &'static str,
    naming_schema: String,
}

#[derive(Debug, Serialize)]
struct TierListing {
    tiers: Vec<TierEntry>,
}

impl TierListing {
    fn catalog() -> Self {
        Self {
            tiers: Tier::ALL
                .iter()
                .map(|&tier| TierEntry {
                    tier,
                    schedule: tier.schedule().to_string(),
                    unit: tier.unit().as_str(),
                    naming_schema: tiersync::tiersync_core::naming::naming_schema(tier),
                })
                .collect(),
        }
    }
}
