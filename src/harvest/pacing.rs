//! Politeness pauses
//!
//! These coarse delays sit on top of the rate limiter's per-request spacing.
//! Every pause is a cancellation point.

use crate::clock::{sleep_or_cancel, Clock};
use crate::config::PacingConfig;
use crate::HarvestError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(config: PacingConfig, clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self {
            config,
            clock,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pause after a page of posts moved the offset from `previous` to `next`
    ///
    /// Crossing a multiple of `checkpoint_every` adds the longer checkpoint pause.
    pub async fn page_turn(&self, previous: usize, next: usize) -> Result<(), HarvestError> {
        let every = self.config.checkpoint_every.max(1);
        if next / every > previous / every {
            tracing::debug!(offset = next, "Checkpoint pause");
            self.pause(self.config.checkpoint_pause_ms).await?;
        }
        self.pause(self.config.page_pause_ms).await
    }

    /// Pause after every `post_batch_every` processed posts
    pub async fn post_processed(&self, processed: usize) -> Result<(), HarvestError> {
        let every = self.config.post_batch_every.max(1);
        if processed > 0 && processed % every == 0 {
            self.pause(self.config.post_batch_pause_ms).await?;
        }
        Ok(())
    }

    pub async fn between_groups(&self) -> Result<(), HarvestError> {
        self.pause(self.config.group_pause_ms).await
    }

    pub async fn between_categories(&self) -> Result<(), HarvestError> {
        self.pause(self.config.category_pause_ms).await
    }

    async fn pause(&self, millis: u64) -> Result<(), HarvestError> {
        sleep_or_cancel(
            self.clock.as_ref(),
            &self.cancel,
            Duration::from_millis(millis),
        )
        .await
    }
}
