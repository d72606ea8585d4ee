//! Process-wide request spacing
//!
//! The limiter owns the only shared mutable state of the harvester: the time
//! of the last granted permit. All access goes through one async mutex, so
//! concurrent callers are serialized and can never both observe a stale
//! timestamp.

use crate::clock::Clock;
use crate::config::interval_for_rate;
use crate::ConfigError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A granted permission to issue one request
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPermit {
    /// When the permit was granted
    pub granted_at: Instant,
    /// How long the caller was delayed to respect the spacing
    pub waited: Duration,
}

/// Enforces a minimum interval between successive permits
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter allowing at most `requests_per_second` permits per second
    ///
    /// Fails when the rate does not map to a representable interval.
    pub fn new(requests_per_second: f64, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let interval = interval_for_rate(requests_per_second).ok_or_else(|| {
            ConfigError::Validation(format!(
                "max-requests-per-second {} has no usable request interval",
                requests_per_second
            ))
        })?;
        Ok(Self::with_interval(interval, clock))
    }

    pub fn with_interval(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval,
            last_permit: Mutex::new(None),
            clock,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until at least `interval` has passed since the previous permit,
    /// then records the new grant time
    ///
    /// The lock is held across the wait, so the check and the update are a
    /// single atomic step for every caller.
    pub async fn acquire(&self) -> RateLimitPermit {
        let mut last_permit = self.last_permit.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(previous) = *last_permit {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.interval {
                waited = self.interval - elapsed;
                tracing::trace!(wait_ms = waited.as_millis() as u64, "Rate limit spacing");
                self.clock.sleep(waited).await;
            }
        }

        let granted_at = self.clock.now();
        *last_permit = Some(granted_at);

        RateLimitPermit { granted_at, waited }
    }
}
