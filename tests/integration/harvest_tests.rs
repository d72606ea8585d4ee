//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the remote API and a manual clock
//! to observe pauses without waiting for them.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vk_harvest::config::{
    ApiConfig, CategoryConfig, Config, HarvestConfig, OutputConfig, PacingConfig,
};
use vk_harvest::harvest::identity::resolve_owner_id;
use vk_harvest::harvest::paginator::fetch_all_posts;
use vk_harvest::harvest::{GroupSource, Pacer, PaginationLimits, Resolution};
use vk_harvest::storage::{RunStatus, SqliteStorage};
use vk_harvest::{
    run_campaign, ApiClient, CampaignRunner, GroupHarvester, GroupRef, HarvestError, ManualClock,
    OwnerId, Record, RecordKind,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const LIST_POSTS: &str = "/method/wall.get";
const LIST_COMMENTS: &str = "/method/wall.getComments";
const RESOLVE_GROUP: &str = "/method/groups.getById";

/// Shared fixtures for one mock API
struct Harness {
    server: MockServer,
    clock: Arc<ManualClock>,
    cancel: CancellationToken,
}

impl Harness {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            clock: Arc::new(ManualClock::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.server.uri(),
            ..ApiConfig::default()
        }
    }

    fn client_with(&self, api: &ApiConfig) -> Arc<ApiClient> {
        Arc::new(
            ApiClient::new(api, "test-token", self.clock.clone(), self.cancel.clone())
                .expect("Failed to build client"),
        )
    }

    fn client(&self) -> Arc<ApiClient> {
        self.client_with(&self.api_config())
    }

    fn pacer(&self) -> Pacer {
        Pacer::new(
            PacingConfig::disabled(),
            self.clock.clone(),
            self.cancel.clone(),
        )
    }

    fn harvester(&self, settings: &HarvestConfig) -> GroupHarvester {
        GroupHarvester::new(self.client(), self.pacer(), settings)
    }

    async fn requests_to(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }
}

fn post_json(id: i64, likes: u32, comments: u32) -> Value {
    json!({
        "id": id,
        "text": format!("post {}", id),
        "likes": { "count": likes },
        "comments": { "count": comments },
        "date": 1_700_000_000 - id,
    })
}

/// A list-posts page of `len` posts with descending ids starting at `first_id`
fn wall_page(first_id: i64, len: usize) -> ResponseTemplate {
    let items: Vec<Value> = (0..len as i64)
        .map(|i| post_json(first_id - i, 1, 0))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "response": { "count": 10_000, "items": items }
    }))
}

fn resolved(group_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "response": { "groups": [{ "id": group_id, "name": "Group" }] }
    }))
}

async fn mount_page(server: &MockServer, domain: &str, offset: usize, page: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", domain))
        .and(query_param("offset", offset.to_string().as_str()))
        .respond_with(page)
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_group(server: &MockServer, slug: &str, group_id: i64) {
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .and(query_param("group_id", slug))
        .respond_with(resolved(group_id))
        .mount(server)
        .await;
}

fn limits(max_posts: usize) -> PaginationLimits {
    PaginationLimits {
        max_posts,
        page_size: 100,
    }
}

#[tokio::test]
async fn test_pagination_stops_at_group_cap() {
    let harness = Harness::start().await;
    mount_page(&harness.server, "gtrktuva", 0, wall_page(1000, 100)).await;
    mount_page(&harness.server, "gtrktuva", 100, wall_page(900, 100)).await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("offset", "200"))
        .and(query_param("count", "50"))
        .respond_with(wall_page(800, 50))
        .expect(1)
        .mount(&harness.server)
        .await;

    let posts = fetch_all_posts(&harness.client(), &harness.pacer(), "gtrktuva", &limits(250))
        .await
        .unwrap();

    assert_eq!(posts.len(), 250);
    assert_eq!(posts[0].id, 1000);
    assert_eq!(posts[249].id, 751);
    assert_eq!(harness.requests_to(LIST_POSTS).await, 3);
}

#[tokio::test]
async fn test_pagination_stops_on_short_page() {
    let harness = Harness::start().await;
    mount_page(&harness.server, "tvtyva", 0, wall_page(500, 100)).await;
    mount_page(&harness.server, "tvtyva", 100, wall_page(400, 100)).await;
    mount_page(&harness.server, "tvtyva", 200, wall_page(300, 47)).await;

    let posts = fetch_all_posts(&harness.client(), &harness.pacer(), "tvtyva", &limits(5000))
        .await
        .unwrap();

    assert_eq!(posts.len(), 247);
    assert_eq!(harness.requests_to(LIST_POSTS).await, 3);
}

#[tokio::test]
async fn test_pagination_stops_on_empty_page() {
    let harness = Harness::start().await;
    mount_page(&harness.server, "tvtyva", 0, wall_page(500, 100)).await;
    mount_page(&harness.server, "tvtyva", 100, wall_page(400, 0)).await;

    let posts = fetch_all_posts(&harness.client(), &harness.pacer(), "tvtyva", &limits(5000))
        .await
        .unwrap();

    assert_eq!(posts.len(), 100);
    assert_eq!(harness.requests_to(LIST_POSTS).await, 2);
}

#[tokio::test]
async fn test_equivalent_references_resolve_to_same_owner() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .and(query_param("group_id", "123"))
        .respond_with(resolved(123))
        .expect(3)
        .mount(&harness.server)
        .await;

    let client = harness.client();
    for reference in ["https://vk.com/club123", "club123", "123"] {
        let resolution = resolve_owner_id(&client, reference).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved(OwnerId::from_group_id(123).unwrap()),
            "reference {}",
            reference
        );
    }
    assert_eq!(OwnerId::from_group_id(123).unwrap().get(), -123);
}

#[tokio::test]
async fn test_legacy_resolve_shape() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": [{ "id": 77 }] })),
        )
        .mount(&harness.server)
        .await;

    let resolution = resolve_owner_id(&harness.client(), "oldgroup").await.unwrap();

    assert_eq!(resolution, Resolution::Resolved(OwnerId::from_group_id(77).unwrap()));
}

#[tokio::test]
async fn test_resolve_error_is_not_found() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "error_code": 100, "error_msg": "One of the parameters specified was missing or invalid" }
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let resolution = resolve_owner_id(&harness.client(), "nosuchgroup").await.unwrap();

    assert_eq!(resolution, Resolution::NotFound);
}

#[tokio::test]
async fn test_group_records_and_comment_ranking() {
    let harness = Harness::start().await;
    mount_group(&harness.server, "gtrktuva", 42).await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "items": [post_json(2, 30, 3), post_json(1, 5, 0)] }
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_COMMENTS))
        .and(query_param("owner_id", "-42"))
        .and(query_param("post_id", "2"))
        .and(query_param("count", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "items": [
                { "id": 11, "text": "meh", "likes": { "count": 1 }, "date": 1_700_000_100 },
                { "id": 12, "text": "great", "likes": { "count": 8 }, "date": 1_700_000_200 },
                { "id": 13, "text": "fine", "likes": { "count": 3 }, "date": 1_700_000_300 }
            ] }
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    // post 1 has no comments and must never be queried
    Mock::given(method("GET"))
        .and(path(LIST_COMMENTS))
        .and(query_param("post_id", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&harness.server)
        .await;

    let settings = HarvestConfig {
        max_comments: 2,
        ..HarvestConfig::default()
    };
    let group = GroupRef::new("News", "gtrktuva");
    let records = harness.harvester(&settings).harvest(&group).await.unwrap();

    let kinds: Vec<RecordKind> = records.iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Post,
            RecordKind::Comment,
            RecordKind::Comment,
            RecordKind::Post
        ]
    );

    let comment_ids: Vec<i64> = records
        .iter()
        .filter_map(|r| r.comment.as_ref())
        .map(|c| c.id)
        .collect();
    assert_eq!(comment_ids, vec![12, 13]);

    let comment_record = &records[1];
    assert_eq!(comment_record.post.id, 2);
    assert_eq!(comment_record.post.like_count, 30);
    assert_eq!(comment_record.comment.as_ref().unwrap().parent_post_id, 2);
    assert!(records.iter().all(|r| r.category == "News"));
    assert!(records.iter().all(|r| r.group == "gtrktuva"));
}

#[tokio::test]
async fn test_unresolvable_group_yields_nothing() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": { "groups": [] } })),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .respond_with(wall_page(10, 10))
        .expect(0)
        .mount(&harness.server)
        .await;

    let records = harness
        .harvester(&HarvestConfig::default())
        .harvest(&GroupRef::new("News", "ghost"))
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_throttle_backs_off_then_drops() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "error_code": 6, "error_msg": "Too many requests per second" }
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let posts = fetch_all_posts(&harness.client(), &harness.pacer(), "gtrktuva", &limits(100))
        .await
        .unwrap();

    assert!(posts.is_empty());
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(10)]);
}

#[tokio::test]
async fn test_throttle_retries_when_configured() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "error_code": 29, "error_msg": "Rate limit reached" }
        })))
        .expect(2)
        .mount(&harness.server)
        .await;

    let api = ApiConfig {
        throttle_retries: 1,
        ..harness.api_config()
    };
    let client = harness.client_with(&api);
    let posts = fetch_all_posts(&client, &harness.pacer(), "gtrktuva", &limits(100))
        .await
        .unwrap();

    assert!(posts.is_empty());
    assert_eq!(
        harness.clock.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn test_transport_error_is_no_data() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&harness.server)
        .await;

    let posts = fetch_all_posts(&harness.client(), &harness.pacer(), "gtrktuva", &limits(100))
        .await
        .unwrap();

    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_failing_group_does_not_stop_category() {
    let harness = Harness::start().await;
    mount_group(&harness.server, "broken", 1).await;
    mount_group(&harness.server, "healthy", 2).await;
    // items without an id cannot be decoded
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "items": [{ "text": "no id here" }] }
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "healthy"))
        .respond_with(wall_page(7, 1))
        .mount(&harness.server)
        .await;

    let categories = vec![CategoryConfig {
        name: "Gov".to_string(),
        groups: vec!["broken".to_string(), "healthy".to_string()],
    }];
    let db_dir = tempfile::tempdir().unwrap();
    let mut storage = SqliteStorage::new(&db_dir.path().join("records.db")).unwrap();

    let runner = CampaignRunner::new(harness.harvester(&HarvestConfig::default()));
    let report = runner.run(&categories, "hash", &mut storage).await.unwrap();

    assert_eq!(report.groups_failed, 1);
    assert_eq!(report.groups_harvested, 1);
    assert!(!report.interrupted);

    let records = storage.load_records(report.run_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].group, "healthy");
    assert_eq!(records[0].post.id, 7);
    assert_eq!(
        storage.get_run(report.run_id).unwrap().status,
        RunStatus::Completed
    );
}

/// Delegates to the real harvester but panics on one group
#[derive(Debug)]
struct PanicsOnGroup {
    reference: &'static str,
    inner: GroupHarvester,
}

impl GroupSource for PanicsOnGroup {
    fn harvest<'a>(
        &'a self,
        group: &'a GroupRef,
    ) -> BoxFuture<'a, Result<Vec<Record>, HarvestError>> {
        Box::pin(async move {
            if group.reference == self.reference {
                panic!("wall state of {} is inconsistent", group.reference);
            }
            self.inner.harvest(group).await
        })
    }
}

#[tokio::test]
async fn test_panicking_group_does_not_stop_category() {
    let harness = Harness::start().await;
    mount_group(&harness.server, "good", 2).await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "good"))
        .respond_with(wall_page(11, 1))
        .expect(1)
        .mount(&harness.server)
        .await;

    let source = PanicsOnGroup {
        reference: "bad",
        inner: harness.harvester(&HarvestConfig::default()),
    };
    let runner = CampaignRunner::with_source(Arc::new(source), harness.pacer());
    let categories = vec![CategoryConfig {
        name: "Gov".to_string(),
        groups: vec!["bad".to_string(), "good".to_string()],
    }];
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let report = runner.run(&categories, "hash", &mut storage).await.unwrap();

    assert_eq!(report.groups_failed, 1);
    assert_eq!(report.groups_harvested, 1);
    assert!(!report.interrupted);

    let records = storage.load_records(report.run_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].group, "good");
    assert_eq!(records[0].post.id, 11);
    assert_eq!(
        storage.get_run(report.run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_overflowing_group_id_is_not_found() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .respond_with(resolved(i64::MIN))
        .expect(1)
        .mount(&harness.server)
        .await;

    let resolution = resolve_owner_id(&harness.client(), "bad").await.unwrap();

    assert_eq!(resolution, Resolution::NotFound);
}

#[tokio::test]
async fn test_campaign_pauses_between_groups_and_categories() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": { "groups": [] } })),
        )
        .mount(&harness.server)
        .await;

    let pacing = PacingConfig {
        group_pause_ms: 3000,
        category_pause_ms: 10_000,
        ..PacingConfig::disabled()
    };
    let pacer = Pacer::new(pacing, harness.clock.clone(), harness.cancel.clone());
    let harvester = GroupHarvester::new(harness.client(), pacer, &HarvestConfig::default());

    let categories = vec![
        CategoryConfig {
            name: "A".to_string(),
            groups: vec!["a1".to_string(), "a2".to_string()],
        },
        CategoryConfig {
            name: "B".to_string(),
            groups: vec!["b1".to_string()],
        },
    ];
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let report = CampaignRunner::new(harvester)
        .run(&categories, "hash", &mut storage)
        .await
        .unwrap();

    assert_eq!(report.groups_harvested, 3);
    assert_eq!(report.total_records(), 0);
    // rate spacing sleeps are sub-second
    let pauses: Vec<Duration> = harness
        .clock
        .sleeps()
        .into_iter()
        .filter(|d| *d >= Duration::from_secs(1))
        .collect();
    assert_eq!(
        pauses,
        vec![Duration::from_secs(3), Duration::from_secs(10)]
    );
}

/// Responds normally but fires the cancellation token first
struct CancelOnRequest(CancellationToken);

impl Respond for CancelOnRequest {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.0.cancel();
        resolved(99)
    }
}

#[tokio::test]
async fn test_interrupt_flushes_completed_groups() {
    let harness = Harness::start().await;
    mount_group(&harness.server, "first", 1).await;
    Mock::given(method("GET"))
        .and(path(RESOLVE_GROUP))
        .and(query_param("group_id", "second"))
        .respond_with(CancelOnRequest(harness.cancel.clone()))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "first"))
        .respond_with(wall_page(3, 3))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "second"))
        .respond_with(wall_page(3, 3))
        .expect(0)
        .mount(&harness.server)
        .await;

    let categories = vec![
        CategoryConfig {
            name: "News".to_string(),
            groups: vec!["first".to_string(), "second".to_string()],
        },
        CategoryConfig {
            name: "Later".to_string(),
            groups: vec!["third".to_string()],
        },
    ];
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let runner = CampaignRunner::new(harness.harvester(&HarvestConfig::default()));
    let report = runner.run(&categories, "hash", &mut storage).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.groups_harvested, 1);
    assert_eq!(report.categories.len(), 1);

    let records = storage.load_records(report.run_id).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.group == "first"));
    assert_eq!(
        storage.get_run(report.run_id).unwrap().status,
        RunStatus::Interrupted
    );
}

#[tokio::test]
async fn test_full_campaign_writes_database() {
    let server = MockServer::start().await;
    mount_group(&server, "gtrktuva", 10).await;
    mount_group(&server, "minjust.tuva", 20).await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "gtrktuva"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "items": [post_json(5, 2, 1), post_json(4, 0, 0)] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_POSTS))
        .and(query_param("domain", "minjust.tuva"))
        .respond_with(wall_page(9, 2))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_COMMENTS))
        .and(query_param("owner_id", "-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "items": [{ "id": 50, "text": "hi", "likes": { "count": 2 }, "date": 0 }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("out").join("records.db");
    let config = Config {
        api: ApiConfig {
            base_url: server.uri(),
            max_requests_per_second: 1000.0,
            ..ApiConfig::default()
        },
        harvest: HarvestConfig::default(),
        pacing: PacingConfig::disabled(),
        output: OutputConfig {
            database_path: db_path.display().to_string(),
        },
        categories: vec![
            CategoryConfig {
                name: "Media".to_string(),
                groups: vec!["https://vk.com/gtrktuva".to_string()],
            },
            CategoryConfig {
                name: "Gov".to_string(),
                groups: vec!["minjust.tuva".to_string()],
            },
        ],
    };

    let mut storage = vk_harvest::storage::open_storage(&db_path).unwrap();
    let report = run_campaign(
        &config,
        "test-token",
        "cafebabe",
        &mut storage,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.total_records(), 5);
    assert_eq!(report.categories[0].comments, 1);
    assert_eq!(report.categories[1].posts, 2);

    let reopened = SqliteStorage::new(&db_path).unwrap();
    let run = reopened.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "cafebabe");
    assert_eq!(
        reopened.category_counts(run.id).unwrap(),
        vec![("Media".to_string(), 3), ("Gov".to_string(), 2)]
    );

    let records = reopened.load_records(run.id).unwrap();
    assert_eq!(records[0].group, "https://vk.com/gtrktuva");
    assert_eq!(records[1].comment.as_ref().unwrap().id, 50);
}
