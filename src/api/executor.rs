//! Single-request execution and outcome classification
//!
//! Every call goes through [`ApiClient::execute`], which:
//! - waits for a rate-limit permit
//! - issues one GET with a bounded total timeout
//! - decodes the response envelope
//! - classifies the result as an [`Outcome`]
//!
//! Nothing raises past this boundary. Transport failures, API errors and
//! throttle signals are logged here and handed back as no-data outcomes.

use crate::api::models::ApiEnvelope;
use crate::api::rate_limiter::RateLimiter;
use crate::clock::{sleep_or_cancel, Clock};
use crate::config::ApiConfig;
use crate::HarvestError;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Remote method names
pub mod methods {
    pub const RESOLVE_GROUP: &str = "groups.getById";
    pub const LIST_POSTS: &str = "wall.get";
    pub const LIST_COMMENTS: &str = "wall.getComments";
}

/// Result of one API call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Decoded `response` payload
    Success(Value),

    /// Structured API error outside the throttle set
    ApplicationError { code: i64, message: String },

    /// API error in the throttle set; the extended backoff has already been applied
    Throttled { code: i64 },

    /// Network failure, timeout or undecodable body
    TransportError(String),

    /// The harvest was cancelled before the call completed
    Cancelled,
}

/// How a caller should treat an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    /// Usable payload
    Payload,
    /// No data this time; the same call may succeed later
    Transient,
    /// No data, and repeating the call will not help
    Terminal,
}

impl Outcome {
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::Success(_) => OutcomeClass::Payload,
            Self::Throttled { .. } | Self::TransportError(_) => OutcomeClass::Transient,
            Self::ApplicationError { .. } | Self::Cancelled => OutcomeClass::Terminal,
        }
    }

    /// Short label for log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ApplicationError { .. } => "application_error",
            Self::Throttled { .. } => "throttled",
            Self::TransportError(_) => "transport_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Converts into the payload, or `Ok(None)` for every no-data outcome
    ///
    /// Cancellation is the one outcome that must stop the caller, so it is
    /// returned as an error.
    pub fn into_payload(self) -> Result<Option<Value>, HarvestError> {
        match self {
            Self::Success(payload) => Ok(Some(payload)),
            Self::Cancelled => Err(HarvestError::Cancelled),
            other => {
                tracing::debug!(outcome = other.label(), class = ?other.class(), "Call produced no data");
                Ok(None)
            }
        }
    }
}

/// Builds the HTTP client used for API calls
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("vk-harvest/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10).min(config.timeout()))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a decoded envelope
pub fn classify(envelope: ApiEnvelope, throttle_codes: &[i64]) -> Outcome {
    match envelope.error {
        Some(error) if throttle_codes.contains(&error.error_code) => Outcome::Throttled {
            code: error.error_code,
        },
        Some(error) => Outcome::ApplicationError {
            code: error.error_code,
            message: error.error_msg,
        },
        None => Outcome::Success(
            envelope
                .response
                .unwrap_or_else(|| Value::Object(Map::new())),
        ),
    }
}

async fn fetch_envelope(request: RequestBuilder) -> Result<ApiEnvelope, reqwest::Error> {
    request.send().await?.json::<ApiEnvelope>().await
}

/// Rate-limited client for the remote API
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    access_token: String,
    version: String,
    timeout: Duration,
    throttle_codes: Vec<i64>,
    throttle_backoff: Duration,
    throttle_retries: u32,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl ApiClient {
    /// Creates a client with its own rate limiter
    pub fn new(
        config: &ApiConfig,
        access_token: impl Into<String>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.max_requests_per_second,
            Arc::clone(&clock),
        )?);
        Self::with_rate_limiter(config, access_token, rate_limiter, clock, cancel)
    }

    /// Creates a client sharing an existing rate limiter
    pub fn with_rate_limiter(
        config: &ApiConfig,
        access_token: impl Into<String>,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            version: config.version.clone(),
            timeout: config.timeout(),
            throttle_codes: config.throttle_codes.clone(),
            throttle_backoff: config.throttle_backoff(),
            throttle_retries: config.throttle_retries,
            rate_limiter,
            clock,
            cancel,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/method/{}", self.base_url, method)
    }

    /// Executes one API method and classifies the result
    ///
    /// A throttle signal triggers the extended backoff. The request is then
    /// re-issued up to `throttle_retries` times before resolving as
    /// [`Outcome::Throttled`].
    pub async fn execute(&self, method: &str, params: &[(&str, String)]) -> Outcome {
        let mut retries = 0;

        loop {
            let code = match self.execute_once(method, params).await {
                Outcome::Throttled { code } => code,
                other => return other,
            };

            tracing::warn!(
                method,
                code,
                backoff_ms = self.throttle_backoff.as_millis() as u64,
                "Throttled by API, backing off"
            );
            if sleep_or_cancel(self.clock.as_ref(), &self.cancel, self.throttle_backoff)
                .await
                .is_err()
            {
                return Outcome::Cancelled;
            }

            if retries >= self.throttle_retries {
                return Outcome::Throttled { code };
            }
            retries += 1;
            tracing::debug!(method, attempt = retries, "Retrying throttled request");
        }
    }

    async fn execute_once(&self, method: &str, params: &[(&str, String)]) -> Outcome {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
            permit = self.rate_limiter.acquire() => permit,
        };

        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("access_token", self.access_token.clone()));
        query.push(("v", self.version.clone()));

        let request = self
            .http
            .get(self.endpoint(method))
            .query(&query)
            .timeout(self.timeout);

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
            result = fetch_envelope(request) => result,
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(e) if e.is_timeout() => {
                tracing::warn!(method, elapsed_ms, "Request timed out");
                return Outcome::TransportError(format!("timeout after {}ms", elapsed_ms));
            }
            Err(e) => {
                tracing::warn!(method, elapsed_ms, error = %e, "Request failed");
                return Outcome::TransportError(e.to_string());
            }
        };

        let outcome = classify(envelope, &self.throttle_codes);
        match &outcome {
            Outcome::Success(_) => tracing::debug!(
                method,
                elapsed_ms,
                waited_ms = permit.waited.as_millis() as u64,
                "Request succeeded"
            ),
            Outcome::ApplicationError { code, message } => {
                tracing::warn!(method, code, message = %message, "API returned an error")
            }
            _ => {}
        }
        outcome
    }
}
