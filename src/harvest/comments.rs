//! Top-K comment selection
//!
//! The API only sorts comments by date, so a window of `2K` recent comments
//! is fetched and re-ranked locally by likes.

use crate::api::models::{take_items, CommentItem};
use crate::api::{methods, ApiClient};
use crate::model::{Comment, OwnerId};
use crate::HarvestError;

/// API ceiling for one list-comments call
pub const MAX_COMMENT_WINDOW: usize = 100;

/// Number of raw comments requested to pick the top `k`
pub fn comment_window(k: usize) -> usize {
    k.saturating_mul(2).clamp(1, MAX_COMMENT_WINDOW)
}

/// Keeps the `k` most-liked comments, ties in fetch order
pub fn select_top(mut comments: Vec<Comment>, k: usize) -> Vec<Comment> {
    // stable: equal like counts keep their relative fetch order
    comments.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    comments.truncate(k);
    comments
}

/// Fetches a recent window of comments under a post and returns the top `k`
///
/// A no-data outcome yields an empty list.
pub async fn fetch_top_comments(
    client: &ApiClient,
    owner_id: OwnerId,
    post_id: i64,
    k: usize,
) -> Result<Vec<Comment>, HarvestError> {
    let params = [
        ("owner_id", owner_id.to_string()),
        ("post_id", post_id.to_string()),
        ("count", comment_window(k).to_string()),
        ("sort", "desc".to_string()),
        ("extended", "0".to_string()),
    ];

    let Some(payload) = client
        .execute(methods::LIST_COMMENTS, &params)
        .await
        .into_payload()?
    else {
        return Ok(Vec::new());
    };

    let items: Vec<CommentItem> = take_items(payload).map_err(|source| HarvestError::Decode {
        what: format!("comments of post {} on {}", post_id, owner_id),
        source,
    })?;

    let fetched = items.len();
    let comments = items
        .into_iter()
        .map(|item| item.into_comment(post_id))
        .collect();
    let selected = select_top(comments, k);

    tracing::trace!(post_id, fetched, kept = selected.len(), "Selected comments");
    Ok(selected)
}
