//! Harvest of a single group: resolve, paginate, attach top comments

use crate::api::ApiClient;
use crate::config::HarvestConfig;
use crate::harvest::comments::fetch_top_comments;
use crate::harvest::identity::{resolve_owner_id, wall_domain, Resolution};
use crate::harvest::pacing::Pacer;
use crate::harvest::paginator::{fetch_all_posts, PaginationLimits};
use crate::model::{GroupRef, Record};
use crate::HarvestError;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::Arc;

/// Progress is logged every this many posts
const PROGRESS_EVERY: usize = 20;

/// Anything that can produce the records of one group
///
/// The campaign runner drives groups through this trait so it can isolate
/// each harvest, whatever produces the records.
pub trait GroupSource: Send + Sync + Debug {
    fn harvest<'a>(&'a self, group: &'a GroupRef)
        -> BoxFuture<'a, Result<Vec<Record>, HarvestError>>;
}

/// Produces the full record set of one group
#[derive(Debug, Clone)]
pub struct GroupHarvester {
    client: Arc<ApiClient>,
    pacer: Pacer,
    limits: PaginationLimits,
    max_comments: usize,
}

impl GroupHarvester {
    pub fn new(client: Arc<ApiClient>, pacer: Pacer, settings: &HarvestConfig) -> Self {
        Self {
            client,
            pacer,
            limits: PaginationLimits {
                max_posts: settings.posts_per_group,
                page_size: settings.page_size,
            },
            max_comments: settings.max_comments,
        }
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Harvests one group
    ///
    /// An unresolvable group or an empty wall yields no records. Every post
    /// yields one post record, followed by up to `max_comments` comment
    /// records in like order. Posts without comments trigger no comment call.
    ///
    /// # Errors
    ///
    /// * `HarvestError::Cancelled` - the harvest was interrupted; nothing of
    ///   this group should be kept
    /// * `HarvestError::Decode` - the API returned items of an unexpected shape
    pub async fn harvest(&self, group: &GroupRef) -> Result<Vec<Record>, HarvestError> {
        let owner_id = match resolve_owner_id(&self.client, &group.reference).await? {
            Resolution::Resolved(owner_id) => owner_id,
            Resolution::NotFound => {
                tracing::warn!(
                    category = %group.category,
                    group = %group.reference,
                    "Could not resolve group, skipping"
                );
                return Ok(Vec::new());
            }
        };

        let domain = wall_domain(&group.reference);
        let posts = fetch_all_posts(&self.client, &self.pacer, &domain, &self.limits).await?;
        if posts.is_empty() {
            tracing::info!(group = %group.reference, "No posts found");
            return Ok(Vec::new());
        }

        let total = posts.len();
        let mut records = Vec::with_capacity(total);
        let mut comment_records = 0;

        for (index, post) in posts.iter().enumerate() {
            let processed = index + 1;
            if processed == 1 || processed % PROGRESS_EVERY == 0 || processed == total {
                tracing::debug!(group = %group.reference, processed, total, "Processing posts");
            }

            records.push(Record::for_post(group, post));

            if post.comment_count > 0 {
                let comments =
                    fetch_top_comments(&self.client, owner_id, post.id, self.max_comments)
                        .await?;
                comment_records += comments.len();
                records.extend(
                    comments
                        .into_iter()
                        .map(|comment| Record::for_comment(group, post, comment)),
                );
            }

            self.pacer.post_processed(processed).await?;
        }

        tracing::info!(
            category = %group.category,
            group = %group.reference,
            owner_id = owner_id.get(),
            posts = total,
            comments = comment_records,
            "Group harvested"
        );
        Ok(records)
    }
}

impl GroupSource for GroupHarvester {
    fn harvest<'a>(
        &'a self,
        group: &'a GroupRef,
    ) -> BoxFuture<'a, Result<Vec<Record>, HarvestError>> {
        Box::pin(GroupHarvester::harvest(self, group))
    }
}
