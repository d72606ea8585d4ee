//! Per-category and per-campaign statistics

use crate::model::Record;
use crate::storage::RunStatus;

/// Inclusive range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    fn from_years(years: impl Iterator<Item = i32>) -> Option<Self> {
        years.fold(None, |range, year| match range {
            None => Some(Self {
                first: year,
                last: year,
            }),
            Some(Self { first, last }) => Some(Self {
                first: first.min(year),
                last: last.max(year),
            }),
        })
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Summary of one category's flushed records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: String,
    pub records: usize,
    pub posts: usize,
    pub comments: usize,

    /// Years of posts that carry a timestamp; `None` if none does
    pub post_years: Option<YearRange>,

    /// Years of comments that carry a timestamp; `None` if none does
    pub comment_years: Option<YearRange>,
}

impl CategoryStats {
    pub fn from_records(category: &str, records: &[Record]) -> Self {
        let comments = records.iter().filter(|r| r.comment.is_some()).count();

        let post_years = YearRange::from_years(
            records
                .iter()
                .filter(|r| r.comment.is_none())
                .filter_map(|r| r.post.year()),
        );
        let comment_years = YearRange::from_years(
            records
                .iter()
                .filter_map(|r| r.comment.as_ref())
                .filter_map(|c| c.year()),
        );

        Self {
            category: category.to_string(),
            records: records.len(),
            posts: records.len() - comments,
            comments,
            post_years,
            comment_years,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            category = %self.category,
            records = self.records,
            posts = self.posts,
            comments = self.comments,
            post_years = %display_range(self.post_years),
            comment_years = %display_range(self.comment_years),
            "Category stats"
        );
    }
}

fn display_range(range: Option<YearRange>) -> String {
    range.map_or_else(|| "none".to_string(), |r| r.to_string())
}

/// Outcome of a whole campaign
#[derive(Debug, Clone, Default)]
pub struct CampaignReport {
    pub run_id: i64,
    pub categories: Vec<CategoryStats>,
    pub groups_harvested: usize,
    pub groups_failed: usize,
    pub interrupted: bool,
}

impl CampaignReport {
    pub fn total_records(&self) -> usize {
        self.categories.iter().map(|c| c.records).sum()
    }

    /// Final status recorded for the run
    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }
}

/// Prints a campaign report to stdout
pub fn print_report(report: &CampaignReport) {
    println!("=== Harvest Report (run {}) ===\n", report.run_id);

    println!("Groups:");
    println!("  Harvested: {}", report.groups_harvested);
    println!("  Failed: {}", report.groups_failed);
    println!();

    println!("Categories:");
    for stats in &report.categories {
        println!(
            "  {}: {} records ({} posts, {} comments), posts {}, comments {}",
            stats.category,
            stats.records,
            stats.posts,
            stats.comments,
            display_range(stats.post_years),
            display_range(stats.comment_years),
        );
    }
    println!();

    println!("Total records: {}", report.total_records());
    if report.interrupted {
        println!("Run was interrupted; the last category may be incomplete.");
    }
}
