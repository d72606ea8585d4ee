//! vk-harvest main entry point
//!
//! Command-line interface for harvesting community walls into SQLite.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vk_harvest::config::{load_config_with_hash, resolve_access_token, ACCESS_TOKEN_ENV};
use vk_harvest::output::print_report;
use vk_harvest::run_campaign;
use vk_harvest::storage::open_storage;

/// vk-harvest: a polite harvester for community walls
///
/// Collects posts and their most-liked comments from the groups listed in the
/// configuration, one category at a time, and stores them as flat records.
/// Press Ctrl-C to stop; groups already harvested in the current category are
/// still saved.
#[derive(Parser, Debug)]
#[command(name = "vk-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite harvester for community walls", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let access_token = resolve_access_token(&config, std::env::var(ACCESS_TOKEN_ENV).ok())?;

    let db_path = Path::new(&config.output.database_path);
    let mut storage = open_storage(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let group_count: usize = config.categories.iter().map(|c| c.groups.len()).sum();
    tracing::info!(
        "Categories: {}, groups: {}, posts per group: {}",
        config.categories.len(),
        group_count,
        config.harvest.posts_per_group
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let report = run_campaign(&config, &access_token, &config_hash, &mut storage, cancel)
        .await
        .context("Harvest failed")?;

    if !cli.quiet {
        print_report(&report);
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vk_harvest=info,warn"),
            1 => EnvFilter::new("vk_harvest=debug,info"),
            _ => EnvFilter::new("vk_harvest=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Fires `cancel` on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, finishing current category flush");
                cancel.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
