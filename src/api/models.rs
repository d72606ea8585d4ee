//! Wire shapes of the remote API
//!
//! Every response is an envelope holding either `response` or `error`.
//! Item lists are decoded strictly: an item missing its `id` is a malformed
//! payload, not an empty one.

use crate::model::{Comment, OwnerId, Post};
use serde::Deserialize;
use serde_json::Value;

/// Top-level response envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Structured error returned in place of a response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

/// `{ "count": n }` objects used for likes and comments
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub count: u32,
}

/// One entry of a list-posts response
#[derive(Debug, Clone, Deserialize)]
pub struct WallItem {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub likes: Counter,
    #[serde(default)]
    pub comments: Counter,
    #[serde(default)]
    pub date: i64,
}

/// One entry of a list-comments response
#[derive(Debug, Clone, Deserialize)]
pub struct CommentItem {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub likes: Counter,
    #[serde(default)]
    pub date: i64,
}

/// One entry of a resolve-group response
#[derive(Debug, Clone, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub id: Option<i64>,
}

/// Resolve-group payload: current keyed shape or legacy bare list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GroupsResponse {
    Keyed { groups: Vec<GroupEntry> },
    Legacy(Vec<GroupEntry>),
}

impl GroupsResponse {
    pub fn entries(&self) -> &[GroupEntry] {
        match self {
            Self::Keyed { groups } => groups,
            Self::Legacy(groups) => groups,
        }
    }

    /// Owner id of the first entry, if it carries a non-zero id
    pub fn first_owner_id(&self) -> Option<OwnerId> {
        self.entries()
            .first()
            .and_then(|entry| entry.id)
            .filter(|id| *id != 0)
            .and_then(OwnerId::from_group_id)
    }
}

/// Takes the `items` array out of a list payload
///
/// A payload without `items` yields an empty list; an `items` array whose
/// entries do not match `T` is an error.
pub fn take_items<T>(mut payload: Value) -> Result<Vec<T>, serde_json::Error>
where
    T: for<'de> Deserialize<'de>,
{
    match payload.as_object_mut().and_then(|obj| obj.remove("items")) {
        Some(items) => serde_json::from_value(items),
        None => Ok(Vec::new()),
    }
}

impl From<WallItem> for Post {
    fn from(item: WallItem) -> Self {
        Self {
            id: item.id,
            text: item.text,
            like_count: item.likes.count,
            comment_count: item.comments.count,
            timestamp_unix: item.date,
        }
    }
}

impl CommentItem {
    pub fn into_comment(self, parent_post_id: i64) -> Comment {
        Comment {
            id: self.id,
            text: self.text,
            like_count: self.likes.count,
            timestamp_unix: self.date,
            parent_post_id,
        }
    }
}
