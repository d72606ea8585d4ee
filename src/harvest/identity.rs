//! Group identity resolution
//!
//! A configured group reference may be a slug (`gtrktuva`), a prefixed
//! numeric id (`club123`) or a full link (`https://vk.com/club123`). It is
//! normalized and sent to the resolve endpoint, whose first entry gives the
//! owner id.

use crate::api::models::GroupsResponse;
use crate::api::{methods, ApiClient};
use crate::model::OwnerId;
use crate::HarvestError;
use url::Url;

/// Hosts whose links are reduced to their trailing path segment
pub const KNOWN_HOSTS: &[&str] = &["vk.com", "vk.ru"];

/// Prefixes that mark a numeric group id
pub const NUMERIC_ID_PREFIXES: &[&str] = &["club", "public", "id"];

/// Result of resolving a group reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(OwnerId),
    NotFound,
}

/// Reduces a reference to the wall slug used by the list-posts endpoint
///
/// Trims whitespace and, for links to a known host, keeps the trailing path
/// segment. Id prefixes are kept: `club123` is a valid wall domain.
pub fn wall_domain(reference: &str) -> String {
    let trimmed = reference.trim();
    known_host_segment(trimmed).unwrap_or_else(|| trimmed.to_string())
}

/// Full normalization pipeline for the resolve endpoint
///
/// 1. trim whitespace
/// 2. take the trailing path segment of a known-host link
/// 3. strip one leading numeric-id prefix
pub fn normalize_reference(reference: &str) -> String {
    strip_id_prefix(&wall_domain(reference)).to_string()
}

/// Strips a single id prefix when the remainder is a number
///
/// `club123` becomes `123`, but slugs that merely start with a prefix
/// (`clubnews`, `idealmedia`) are left alone.
/// Unlike stripping any leading known prefix, `clubnews` never becomes `news`.
fn strip_id_prefix(slug: &str) -> &str {
    for prefix in NUMERIC_ID_PREFIXES {
        if let Some(rest) = slug.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return rest;
            }
        }
    }
    slug
}

/// Trailing path segment of a link to a known host, with or without scheme
fn known_host_segment(reference: &str) -> Option<String> {
    let candidate = if reference.contains("://") {
        reference.to_string()
    } else {
        format!("https://{}", reference)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let known = KNOWN_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)));
    if !known {
        return None;
    }

    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Resolves a group reference to its owner id
///
/// Any no-data outcome, an unrecognized payload shape, an empty entry list
/// or a missing id yields [`Resolution::NotFound`]. Resolution is not retried.
/// The only error is cancellation.
pub async fn resolve_owner_id(
    client: &ApiClient,
    reference: &str,
) -> Result<Resolution, HarvestError> {
    let slug = normalize_reference(reference);
    tracing::debug!(reference, slug = %slug, "Resolving group");

    let params = [("group_id", slug.clone())];
    let Some(payload) = client
        .execute(methods::RESOLVE_GROUP, &params)
        .await
        .into_payload()?
    else {
        return Ok(Resolution::NotFound);
    };

    let owner_id = serde_json::from_value::<GroupsResponse>(payload)
        .ok()
        .and_then(|groups| groups.first_owner_id());

    match owner_id {
        Some(owner_id) => {
            tracing::debug!(reference, owner_id = owner_id.get(), "Resolved group");
            Ok(Resolution::Resolved(owner_id))
        }
        None => {
            tracing::warn!(reference, slug = %slug, "Resolve response has no usable group id");
            Ok(Resolution::NotFound)
        }
    }
}
