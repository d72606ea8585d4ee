//! Configuration module for vk-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use vk_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Posts per group: {}", config.harvest.posts_per_group);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    interval_for_rate, ApiConfig, CategoryConfig, Config, HarvestConfig, OutputConfig,
    PacingConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, resolve_access_token,
    ACCESS_TOKEN_ENV,
};
