//! Harvest pipeline
//!
//! This module contains:
//! - Group identity resolution
//! - Post pagination and top-comment selection
//! - Per-group harvesting and the campaign loop
//! - Politeness pacing

mod campaign;
pub mod comments;
mod group;
pub mod identity;
pub mod pacing;
pub mod paginator;

pub use campaign::CampaignRunner;
pub use group::{GroupHarvester, GroupSource};
pub use identity::{normalize_reference, wall_domain, Resolution};
pub use pacing::Pacer;
pub use paginator::{PaginationLimits, StopReason};

use crate::api::ApiClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::output::CampaignReport;
use crate::storage::RecordSink;
use crate::HarvestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main entry point for a harvest
///
/// Builds the API client, pacer and runner on the system clock and runs every
/// configured category. `cancel` stops the campaign at its next suspension
/// point; the returned report is then flagged as interrupted.
///
/// # Example
///
/// ```no_run
/// # use vk_harvest::config::load_config_with_hash;
/// # use vk_harvest::run_campaign;
/// # use vk_harvest::storage::SqliteStorage;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash("harvest.toml".as_ref())?;
/// let mut storage = SqliteStorage::new(config.output.database_path.as_ref())?;
/// let report = run_campaign(&config, "token", &hash, &mut storage, CancellationToken::new()).await?;
/// println!("{} records", report.total_records());
/// # Ok(())
/// # }
/// ```
pub async fn run_campaign(
    config: &Config,
    access_token: &str,
    config_hash: &str,
    sink: &mut dyn RecordSink,
    cancel: CancellationToken,
) -> Result<CampaignReport, HarvestError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = ApiClient::new(&config.api, access_token, Arc::clone(&clock), cancel.clone())?;
    let pacer = Pacer::new(config.pacing.clone(), clock, cancel);
    let harvester = GroupHarvester::new(Arc::new(client), pacer, &config.harvest);

    CampaignRunner::new(harvester)
        .run(&config.categories, config_hash, sink)
        .await
}
