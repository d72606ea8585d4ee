//! vk-harvest: a polite harvester for public community walls
//!
//! This crate collects posts and their most-liked comments from a fixed set of
//! community groups through a rate-limited JSON API, and emits a flat sequence
//! of records per category for downstream analysis.

pub mod api;
pub mod clock;
pub mod config;
pub mod harvest;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
///
/// Remote failures (transport errors, API errors, throttling) are not errors
/// at this level: they are absorbed by the request executor and surface as
/// [`api::Outcome`] values.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: String,
        source: serde_json::Error,
    },

    #[error("Harvest cancelled")]
    Cancelled,

    #[error("Group harvest panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No API access token configured (set api.access-token or {0})")]
    MissingToken(&'static str),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::{ApiClient, Outcome, RateLimiter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use harvest::{run_campaign, CampaignRunner, GroupHarvester};
pub use model::{Comment, GroupRef, OwnerId, Post, Record, RecordKind};
