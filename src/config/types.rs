use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for vk-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryConfig>,
}

/// Remote API access configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Scheme and host of the API; endpoints live under `{base-url}/method/`
    pub base_url: String,

    /// API version tag sent with every request
    pub version: String,

    /// Bearer token; the `VK_ACCESS_TOKEN` environment variable takes precedence
    pub access_token: Option<String>,

    /// Total timeout for a single request
    pub timeout_secs: u64,

    /// Request-per-second ceiling enforced by the rate limiter
    pub max_requests_per_second: f64,

    /// Error codes that signal throttling
    pub throttle_codes: Vec<i64>,

    /// Extra pause applied after a throttle signal (milliseconds)
    pub throttle_backoff_ms: u64,

    /// How many times a throttled request is re-issued after the backoff
    pub throttle_retries: u32,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn throttle_backoff(&self) -> Duration {
        Duration::from_millis(self.throttle_backoff_ms)
    }

    /// Minimum spacing between requests, or `None` if the rate has no
    /// representable interval
    pub fn request_interval(&self) -> Option<Duration> {
        interval_for_rate(self.max_requests_per_second)
    }
}

/// Converts a request rate into the spacing between two requests
///
/// Rejects non-finite and non-positive rates, and rates so small that the
/// interval overflows a `Duration`.
pub fn interval_for_rate(requests_per_second: f64) -> Option<Duration> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / requests_per_second).ok()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vk.com".to_string(),
            version: "5.199".to_string(),
            access_token: None,
            timeout_secs: 30,
            max_requests_per_second: 2.0,
            throttle_codes: vec![6, 29],
            throttle_backoff_ms: 10_000,
            throttle_retries: 0,
        }
    }
}

/// Harvest limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Maximum number of posts fetched per group
    pub posts_per_group: usize,

    /// Maximum number of comments kept per post
    pub max_comments: usize,

    /// Posts requested per list-posts call (API ceiling is 100)
    pub page_size: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            posts_per_group: 5000,
            max_comments: 10,
            page_size: 100,
        }
    }
}

/// Politeness pauses layered on top of the rate limiter
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingConfig {
    /// Pause after every page of posts (milliseconds)
    pub page_pause_ms: u64,

    /// Offset interval at which the longer checkpoint pause applies
    pub checkpoint_every: usize,

    /// Pause when the offset crosses a checkpoint (milliseconds)
    pub checkpoint_pause_ms: u64,

    /// Number of processed posts between short pauses
    pub post_batch_every: usize,

    /// Pause after each batch of processed posts (milliseconds)
    pub post_batch_pause_ms: u64,

    /// Pause between groups of a category (milliseconds)
    pub group_pause_ms: u64,

    /// Pause between categories (milliseconds)
    pub category_pause_ms: u64,
}

impl PacingConfig {
    /// A configuration with every pause disabled
    pub fn disabled() -> Self {
        Self {
            page_pause_ms: 0,
            checkpoint_pause_ms: 0,
            post_batch_pause_ms: 0,
            group_pause_ms: 0,
            category_pause_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_pause_ms: 300,
            checkpoint_every: 300,
            checkpoint_pause_ms: 1000,
            post_batch_every: 10,
            post_batch_pause_ms: 200,
            group_pause_ms: 3000,
            category_pause_ms: 10_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database receiving harvested records
    pub database_path: String,
}

/// A category and its groups, harvested in the listed order
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Category label carried by every record
    pub name: String,

    /// Group references: slug, URL or prefixed numeric id
    pub groups: Vec<String>,
}
