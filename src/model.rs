//! Domain types shared by the harvester and the record sink

use chrono::DateTime;
use std::fmt;

/// Format used for the derived `date` fields
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical owner identifier of a community wall
///
/// Community-owned content is addressed with a negative id by API convention,
/// so the constructor always forces the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(i64);

impl OwnerId {
    /// Builds an owner id from a group id returned by the resolve endpoint
    ///
    /// `None` for `i64::MIN`, whose magnitude has no positive counterpart.
    pub fn from_group_id(group_id: i64) -> Option<Self> {
        group_id.checked_abs().map(|id| Self(-id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A configured group: its category label and the human-supplied reference
/// (slug, URL or prefixed numeric id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub category: String,
    pub reference: String,
}

impl GroupRef {
    pub fn new(category: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            reference: reference.into(),
        }
    }
}

/// A wall post as fetched from the list-posts endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub like_count: u32,
    pub comment_count: u32,
    pub timestamp_unix: i64,
}

impl Post {
    pub fn date(&self) -> Option<String> {
        format_timestamp(self.timestamp_unix)
    }

    pub fn year(&self) -> Option<i32> {
        year_of(self.timestamp_unix)
    }
}

/// A comment under a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub like_count: u32,
    pub timestamp_unix: i64,
    pub parent_post_id: i64,
}

impl Comment {
    pub fn date(&self) -> Option<String> {
        format_timestamp(self.timestamp_unix)
    }

    pub fn year(&self) -> Option<i32> {
        year_of(self.timestamp_unix)
    }
}

/// Kind of a flat record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Post,
    Comment,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// The unit emitted by the harvester
///
/// A post record has no comment. A comment record carries the owning post as
/// a denormalized summary. The kind is derived from the presence of the
/// comment, so a record can never claim to be a comment without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub category: String,
    pub group: String,
    pub post: Post,
    pub comment: Option<Comment>,
}

impl Record {
    pub fn for_post(group: &GroupRef, post: &Post) -> Self {
        Self {
            category: group.category.clone(),
            group: group.reference.clone(),
            post: post.clone(),
            comment: None,
        }
    }

    pub fn for_comment(group: &GroupRef, post: &Post, comment: Comment) -> Self {
        Self {
            category: group.category.clone(),
            group: group.reference.clone(),
            post: post.clone(),
            comment: Some(comment),
        }
    }

    pub fn kind(&self) -> RecordKind {
        if self.comment.is_some() {
            RecordKind::Comment
        } else {
            RecordKind::Post
        }
    }
}

/// Formats a unix timestamp as a UTC date string; zero means "unknown"
pub fn format_timestamp(timestamp: i64) -> Option<String> {
    if timestamp == 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// UTC calendar year of a unix timestamp; zero means "unknown"
pub fn year_of(timestamp: i64) -> Option<i32> {
    use chrono::Datelike;

    if timestamp == 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.year())
}
