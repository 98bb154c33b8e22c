//! Fan-out across several mock catalogs

mod common;

use common::{
    github_registry, github_search_body, npm_object, npm_registry, npm_search_body,
    official_registry,
};
use mcp_hub::config::{HubConfig, SecurityMode};
use mcp_hub::registry::types::{ServerCategory, SortKey};
use mcp_hub::registry::{ClientOptions, PolicyFilter, RegistryScanner, SearchRequest};
use mcp_hub::utils::{EventBus, HubEvent};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options() -> ClientOptions {
    ClientOptions {
        timeout: Duration::from_secs(10),
        retry_count: 0,
        ..ClientOptions::default()
    }
}

async fn npm_catalog(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/-/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn github_catalog(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_slow_registry_does_not_fail_search() {
    let official = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/servers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"servers": [], "metadata": {"count": 0}})),
        )
        .mount(&official)
        .await;
    let github = github_catalog(github_search_body(&["acme/test-mcp"])).await;
    let npm = npm_catalog(npm_search_body(vec![npm_object("vitest-mcp", &["mcp", "testing"], 50)])).await;

    let events = EventBus::new();
    let mut rx = events.subscribe();
    let scanner = RegistryScanner::from_registries(
        vec![
            official_registry(&official.uri()),
            github_registry(&github.uri()),
            npm_registry(&npm.uri()),
        ],
        &options(),
        events,
    )
    .unwrap();

    let report = scanner
        .search_with_timeout(
            &SearchRequest::query("test"),
            &PolicyFilter::permissive(),
            Duration::from_millis(300),
        )
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failed_sources(), 1);
    assert_eq!(report.failures[0].registry_id, "official");
    assert!(report.failures[0].timed_out);
    assert_eq!(report.total_servers(), 2);

    let mut saw_failure = false;
    let mut saw_completion = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            HubEvent::RegistryFailed { registry_id, .. } => {
                assert_eq!(registry_id, "official");
                saw_failure = true;
            }
            HubEvent::SearchCompleted { failed_sources, .. } => {
                assert_eq!(failed_sources, 1);
                saw_completion = true;
            }
            _ => {}
        }
    }
    assert!(saw_failure && saw_completion);
}

#[tokio::test]
async fn test_strict_mode_returns_only_verified() {
    let npm = npm_catalog(npm_search_body(vec![
        npm_object("@modelcontextprotocol/server-tests", &["mcp", "testing"], 9000),
        npm_object("community-test-runner", &["mcp", "testing"], 300),
        npm_object("@modelcontextprotocol/server-e2e", &["mcp", "testing"], 4000),
        npm_object("another-test-helper", &["mcp", "testing"], 20),
        npm_object("@modelcontextprotocol/server-jest", &["mcp", "testing"], 100),
    ]))
    .await;

    let scanner =
        RegistryScanner::from_registries(vec![npm_registry(&npm.uri())], &options(), EventBus::new())
            .unwrap();

    let mut config = HubConfig::default();
    config.global_settings.security_mode = SecurityMode::Strict;
    let request = SearchRequest {
        category: Some(ServerCategory::Testing),
        limit: 5,
        ..SearchRequest::default()
    };

    let report = scanner
        .search(&request, &PolicyFilter::from_config(&config))
        .await
        .unwrap();
    let servers = report.merged(&request);

    assert_eq!(servers.len(), 3);
    assert!(servers.iter().all(|s| s.is_verified()));
}

#[tokio::test]
async fn test_every_registry_failing_fails_the_search() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;

    let scanner = RegistryScanner::from_registries(
        vec![github_registry(&broken.uri()), npm_registry(&broken.uri())],
        &options(),
        EventBus::new(),
    )
    .unwrap();

    let err = scanner
        .search(&SearchRequest::default(), &PolicyFilter::permissive())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ALL_REGISTRIES_FAILED");
}

#[tokio::test]
async fn test_merged_view_dedupes_by_priority_then_sorts() {
    let github = github_catalog(github_search_body(&["acme/shared"])).await;
    let npm = npm_catalog(npm_search_body(vec![
        npm_object("acme/shared", &["mcp", "testing"], 10),
        npm_object("popular-test-mcp", &["mcp", "testing"], 80_000),
    ]))
    .await;

    let scanner = RegistryScanner::from_registries(
        vec![npm_registry(&npm.uri()), github_registry(&github.uri())],
        &options(),
        EventBus::new(),
    )
    .unwrap();

    let request = SearchRequest::query("test");
    let report = scanner.search(&request, &PolicyFilter::permissive()).await.unwrap();

    let merged = report.merged(&request);
    assert_eq!(merged.len(), 2);
    let shared = merged.iter().find(|s| s.id == "acme/shared").unwrap();
    assert_eq!(shared.registry_id, "github");

    let by_downloads = SearchRequest {
        sort_by: Some(SortKey::Downloads),
        ..request
    };
    assert_eq!(report.merged(&by_downloads)[0].id, "popular-test-mcp");
}

#[tokio::test]
async fn test_inactive_registries_are_skipped_and_sync_is_stamped() {
    let npm = npm_catalog(npm_search_body(Vec::new())).await;
    let mut github = github_registry("http://127.0.0.1:9");
    github.active = false;

    let scanner = RegistryScanner::from_registries(
        vec![github, npm_registry(&npm.uri())],
        &options(),
        EventBus::new(),
    )
    .unwrap();

    let report = scanner
        .search(&SearchRequest::default(), &PolicyFilter::permissive())
        .await
        .unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.failed_sources(), 0);

    assert_eq!(scanner.mark_synced(), 1);
    let registries = scanner.registries();
    let npm_entry = registries.iter().find(|r| r.id == "npm").unwrap();
    let github_entry = registries.iter().find(|r| r.id == "github").unwrap();
    assert!(npm_entry.last_sync.is_some());
    assert!(github_entry.last_sync.is_none());
}
