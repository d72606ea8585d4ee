//! Remote API access
//!
//! This module contains everything that talks to the remote service:
//! - Process-wide request spacing
//! - Single-request execution with timeout and outcome classification
//! - Wire shapes of responses

mod executor;
pub mod models;
mod rate_limiter;

pub use executor::{build_http_client, classify, methods, ApiClient, Outcome, OutcomeClass};
pub use rate_limiter::{RateLimitPermit, RateLimiter};
