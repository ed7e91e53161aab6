//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn and no network port, so they run in CI without `#[ignore]`.

use cluster_atlas::api::{create_app, ApiState};
use cluster_atlas::config::StateConfig;
use cluster_atlas::engine::ClusterActor;
use cluster_atlas::enrichment::StaticGeocoder;
use cluster_atlas::types::{BenchmarkKind, Resource};
use cluster_atlas::{ClusterEvent, ClusterHandle};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

fn spawn_cluster() -> ClusterHandle {
    let (cluster, _restarts) = ClusterActor::spawn(
        StateConfig::default(),
        None,
        Arc::new(StaticGeocoder::new("Somewhere")),
    );
    cluster
}

/// A cluster that knows its own identity, one peer and one CPU score.
async fn populated_cluster() -> ClusterHandle {
    let cluster = spawn_cluster();
    for event in [
        ClusterEvent::NodeAcknowledged { id: "a".into() },
        ClusterEvent::NodeJoined { id: "b".into() },
        ClusterEvent::ResourceCreated {
            node_id: "b".into(),
            resource: Resource::benchmark_score("b", BenchmarkKind::Cpu, 12.5),
        },
    ] {
        cluster.dispatch(event).await.unwrap();
    }
    cluster.flush().await.unwrap();
    cluster
}

async fn get_json(cluster: &ClusterHandle, uri: &str) -> (StatusCode, serde_json::Value) {
    let app = create_app(ApiState::new(cluster.clone()));
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

/// All v1 GET endpoints should return 200 once the identity is known.
#[tokio::test]
async fn test_v1_get_endpoints_return_200() {
    let cluster = populated_cluster().await;

    let endpoints = [
        "/api/v1/health",
        "/api/v1/graphs",
        "/api/v1/graphs/cluster",
        "/api/v1/graphs/network",
        "/api/v1/graphs/resources",
        "/api/v1/graphs/local",
        "/api/v1/stats",
        "/api/v1/cluster",
        "/api/v1/local",
        "/api/v1/log",
    ];

    for endpoint in &endpoints {
        let (status, json) = get_json(&cluster, endpoint).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint} returned status {status}");
        assert!(json.get("data").is_some(), "GET {endpoint} is missing the data envelope");
        assert_eq!(json["meta"]["version"], "1");
    }
}

/// /api/v1/health summarizes the roster.
#[tokio::test]
async fn test_v1_health_reports_roster() {
    let cluster = populated_cluster().await;
    let (status, json) = get_json(&cluster, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["local_node"], "a");
    assert_eq!(json["data"]["nodes"], 2);
    assert_eq!(json["data"]["opened"], false);
}

/// Snapshot-backed responses carry the snapshot version.
#[tokio::test]
async fn test_v1_stats_carry_snapshot_version() {
    let cluster = populated_cluster().await;
    let version = cluster.snapshot().version;
    let (status, json) = get_json(&cluster, "/api/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["snapshot"], version);
    assert_eq!(json["data"]["compute"]["b"], 12.5);
    assert_eq!(json["data"]["compute_summary"]["count"], 1);
    assert!(json["data"]["networking_summary"].is_null());
}

/// The cluster graph contains a vertex per node.
#[tokio::test]
async fn test_v1_cluster_graph_lists_nodes() {
    let cluster = populated_cluster().await;
    let (_, json) = get_json(&cluster, "/api/v1/graphs/cluster").await;

    let ids: Vec<&str> = json["data"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert!(ids.contains(&"Node/a"), "vertices: {ids:?}");
    assert!(ids.contains(&"Node/b"), "vertices: {ids:?}");
}

/// Without a local identity the local graph does not exist yet.
#[tokio::test]
async fn test_v1_local_graph_is_404_before_acknowledgement() {
    let cluster = spawn_cluster();
    let (status, json) = get_json(&cluster, "/api/v1/graphs/local").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
    assert!(json.get("data").is_none());
}

/// The log lists every ingested event in order.
#[tokio::test]
async fn test_v1_log_lists_events() {
    let cluster = populated_cluster().await;
    let (_, json) = get_json(&cluster, "/api/v1/log").await;

    let lines = json["data"].as_array().unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].as_str().unwrap().contains("Management node acknowledged: a"));
    assert!(lines[1].as_str().unwrap().contains("Management node joined: b"));
}

/// Unknown paths are not served.
#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = create_app(ApiState::new(spawn_cluster()));
    let resp = app
        .oneshot(Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
