use crate::config::types::{
    ApiConfig, CategoryConfig, Config, HarvestConfig, OutputConfig, PacingConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest page the list-posts endpoint accepts
const MAX_PAGE_SIZE: usize = 100;

/// Largest comment cap whose fetch window (2K) still fits in one call
const MAX_COMMENTS_CAP: usize = 50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_harvest_config(&config.harvest)?;
    validate_pacing_config(&config.pacing)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates remote API settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "version cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.request_interval().is_none() {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-second must be a positive number with a representable interval, got {}",
            config.max_requests_per_second
        )));
    }

    Ok(())
}

/// Validates harvest limits against the API ceilings
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.posts_per_group < 1 {
        return Err(ConfigError::Validation(
            "posts-per-group must be >= 1".to_string(),
        ));
    }

    if config.max_comments < 1 || config.max_comments > MAX_COMMENTS_CAP {
        return Err(ConfigError::Validation(format!(
            "max-comments must be between 1 and {}, got {}",
            MAX_COMMENTS_CAP, config.max_comments
        )));
    }

    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-every must be >= 1".to_string(),
        ));
    }

    if config.post_batch_every < 1 {
        return Err(ConfigError::Validation(
            "post-batch-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates categories: at least one, unique non-empty names, non-blank groups
fn validate_categories(categories: &[CategoryConfig]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for category in categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(category.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category '{}'",
                category.name
            )));
        }

        if category.groups.is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' must list at least one group",
                category.name
            )));
        }

        if category.groups.iter().any(|group| group.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "category '{}' contains a blank group reference",
                category.name
            )));
        }
    }

    Ok(())
}
