//! Post pagination over a group wall
//!
//! # State machine
//!
//! ```text
//! Fetching(offset) ──► Continue(offset + requested) ──► Fetching(...)
//!        │
//!        └──────────► Done(EmptyBatch | ShortBatch | CapReached | NoData)
//! ```
//!
//! The offset advances by the batch size requested, not the size received.
//! A no-data outcome stops pagination but keeps what was already collected.

use crate::api::models::{take_items, WallItem};
use crate::api::{methods, ApiClient};
use crate::harvest::pacing::Pacer;
use crate::model::Post;
use crate::HarvestError;

/// API ceiling for one list-posts call
pub const MAX_PAGE_SIZE: usize = 100;

/// Pagination cursor for one group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub offset: usize,
    pub batch_size: usize,
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EmptyBatch,
    ShortBatch,
    CapReached,
    NoData,
}

/// Transition taken after a page is received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// Fetch again at the given offset
    Continue(usize),
    Done(StopReason),
}

/// Limits for one group's pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    /// Upper bound on posts collected
    pub max_posts: usize,
    /// Preferred page size, clamped to [`MAX_PAGE_SIZE`]
    pub page_size: usize,
}

impl PaginationLimits {
    /// The window for the next call, or `None` once the cap is reached
    pub fn window(&self, offset: usize, collected: usize) -> Option<FetchWindow> {
        let pending = self.max_posts.saturating_sub(collected);
        if pending == 0 {
            return None;
        }
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        Some(FetchWindow {
            offset,
            batch_size: pending.min(page_size),
        })
    }
}

/// Decides the next step after receiving `received` posts for `window`
///
/// `collected` is the running total including this batch.
pub fn next_step(
    window: FetchWindow,
    received: usize,
    collected: usize,
    limits: &PaginationLimits,
) -> PageStep {
    if received == 0 {
        PageStep::Done(StopReason::EmptyBatch)
    } else if collected >= limits.max_posts {
        PageStep::Done(StopReason::CapReached)
    } else if received < window.batch_size {
        PageStep::Done(StopReason::ShortBatch)
    } else {
        PageStep::Continue(window.offset + window.batch_size)
    }
}

/// Fetches one page; `Ok(None)` means the call produced no data
async fn fetch_page(
    client: &ApiClient,
    domain: &str,
    window: FetchWindow,
) -> Result<Option<Vec<Post>>, HarvestError> {
    let params = [
        ("domain", domain.to_string()),
        ("count", window.batch_size.to_string()),
        ("offset", window.offset.to_string()),
    ];

    let Some(payload) = client
        .execute(methods::LIST_POSTS, &params)
        .await
        .into_payload()?
    else {
        return Ok(None);
    };

    let items: Vec<WallItem> = take_items(payload).map_err(|source| HarvestError::Decode {
        what: format!("posts of {} at offset {}", domain, window.offset),
        source,
    })?;

    Ok(Some(items.into_iter().map(Post::from).collect()))
}

/// Collects posts of a wall, newest first, up to `limits.max_posts`
///
/// Returns whatever was accumulated when pagination stops, possibly nothing.
pub async fn fetch_all_posts(
    client: &ApiClient,
    pacer: &Pacer,
    domain: &str,
    limits: &PaginationLimits,
) -> Result<Vec<Post>, HarvestError> {
    let mut posts: Vec<Post> = Vec::new();
    let mut offset = 0;

    let reason = loop {
        let Some(window) = limits.window(offset, posts.len()) else {
            break StopReason::CapReached;
        };

        tracing::debug!(domain, offset, count = window.batch_size, "Requesting posts");
        let Some(batch) = fetch_page(client, domain, window).await? else {
            break StopReason::NoData;
        };

        let received = batch.len();
        posts.extend(batch.into_iter().take(window.batch_size));

        match next_step(window, received, posts.len(), limits) {
            PageStep::Done(reason) => break reason,
            PageStep::Continue(next) => {
                pacer.page_turn(offset, next).await?;
                offset = next;
            }
        }
    };

    tracing::info!(domain, total = posts.len(), stop = ?reason, "Loaded posts");
    Ok(posts)
}
