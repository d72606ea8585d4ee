//! Campaign runner
//!
//! Walks categories and their groups in configuration order. Each group is
//! harvested in isolation: an error or a panic costs that group's records and
//! nothing else. Records are handed to the sink once per category.

use crate::config::CategoryConfig;
use crate::harvest::group::{GroupHarvester, GroupSource};
use crate::harvest::pacing::Pacer;
use crate::model::{GroupRef, Record};
use crate::output::{CampaignReport, CategoryStats};
use crate::storage::{RecordSink, RunStatus};
use crate::HarvestError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Drives a full harvest over all categories
#[derive(Debug, Clone)]
pub struct CampaignRunner {
    source: Arc<dyn GroupSource>,
    pacer: Pacer,
}

impl CampaignRunner {
    /// Runner over the API harvester, sharing its pacer
    pub fn new(harvester: GroupHarvester) -> Self {
        let pacer = harvester.pacer().clone();
        Self::with_source(Arc::new(harvester), pacer)
    }

    pub fn with_source(source: Arc<dyn GroupSource>, pacer: Pacer) -> Self {
        Self { source, pacer }
    }

    /// Runs the campaign and records its final status in the sink
    ///
    /// Returns a report whose `interrupted` flag is set when cancellation cut
    /// the campaign short. Records of groups finished before the interrupt are
    /// still flushed.
    ///
    /// # Errors
    ///
    /// Only storage failures abort the campaign. The run is then marked
    /// failed, on a best-effort basis.
    pub async fn run(
        &self,
        categories: &[CategoryConfig],
        config_hash: &str,
        sink: &mut dyn RecordSink,
    ) -> Result<CampaignReport, HarvestError> {
        let run_id = sink.begin_run(config_hash)?;
        tracing::info!(run_id, categories = categories.len(), "Starting harvest run");

        let mut report = CampaignReport {
            run_id,
            ..CampaignReport::default()
        };

        if let Err(e) = self.run_categories(categories, sink, &mut report).await {
            tracing::error!(run_id, error = %e, "Harvest run failed");
            if let Err(finish_err) = sink.finish_run(run_id, RunStatus::Failed) {
                tracing::error!(run_id, error = %finish_err, "Could not mark run as failed");
            }
            return Err(e);
        }

        sink.finish_run(run_id, report.status())?;
        tracing::info!(
            run_id,
            records = report.total_records(),
            groups_harvested = report.groups_harvested,
            groups_failed = report.groups_failed,
            interrupted = report.interrupted,
            "Harvest run finished"
        );
        Ok(report)
    }

    async fn run_categories(
        &self,
        categories: &[CategoryConfig],
        sink: &mut dyn RecordSink,
        report: &mut CampaignReport,
    ) -> Result<(), HarvestError> {
        for (index, category) in categories.iter().enumerate() {
            if index > 0 && self.pacer.between_categories().await.is_err() {
                report.interrupted = true;
                break;
            }

            tracing::info!(
                category = %category.name,
                groups = category.groups.len(),
                "Harvesting category"
            );
            let records = self.harvest_category(category, report).await;
            self.flush(category, &records, sink, report)?;

            if report.interrupted {
                break;
            }
        }

        if report.interrupted {
            tracing::warn!(run_id = report.run_id, "Harvest interrupted");
        }
        Ok(())
    }

    /// Collects the records of every group of a category
    ///
    /// Stops early on cancellation, keeping what completed groups produced.
    async fn harvest_category(
        &self,
        category: &CategoryConfig,
        report: &mut CampaignReport,
    ) -> Vec<Record> {
        let mut records = Vec::new();

        for (index, reference) in category.groups.iter().enumerate() {
            if index > 0 && self.pacer.between_groups().await.is_err() {
                report.interrupted = true;
                break;
            }

            let group = GroupRef::new(category.name.as_str(), reference.as_str());
            match self.harvest_isolated(&group).await {
                Ok(group_records) => {
                    report.groups_harvested += 1;
                    records.extend(group_records);
                }
                Err(HarvestError::Cancelled) => {
                    tracing::warn!(
                        group = %group.reference,
                        "Group interrupted, discarding its partial records"
                    );
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        category = %group.category,
                        group = %group.reference,
                        error = %e,
                        "Group harvest failed, continuing with next group"
                    );
                    report.groups_failed += 1;
                }
            }
        }

        records
    }

    async fn harvest_isolated(&self, group: &GroupRef) -> Result<Vec<Record>, HarvestError> {
        if self.pacer.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        AssertUnwindSafe(self.source.harvest(group))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HarvestError::Panic(panic_message(&*panic))))
    }

    fn flush(
        &self,
        category: &CategoryConfig,
        records: &[Record],
        sink: &mut dyn RecordSink,
        report: &mut CampaignReport,
    ) -> Result<(), HarvestError> {
        let stats = CategoryStats::from_records(&category.name, records);

        if records.is_empty() {
            tracing::warn!(category = %category.name, "No records collected for category");
        } else {
            sink.write_category(report.run_id, &category.name, records)?;
            stats.log();
        }

        report.categories.push(stats);
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
