//! Output module for harvest statistics and reports

pub mod stats;

pub use stats::{print_report, CampaignReport, CategoryStats, YearRange};
