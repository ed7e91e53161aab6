//! Cluster Scenario Tests
//!
//! Several observing nodes share one in-process loopback runtime. Each test
//! drives sessions and enrichment producers and checks what every observer's
//! published snapshot converges to.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use cluster_atlas::config::{DeletionScope, StateConfig};
use cluster_atlas::enrichment::{
    Capabilities, EnrichmentError, FixedCoordinates, FixedScore, Geocoder, Place, StaticAddress,
    StaticGeocoder,
};
use cluster_atlas::ingestion::RejectionHandler;
use cluster_atlas::runtime::{ClusterRuntime, LoopbackCluster};
use cluster_atlas::types::{BenchmarkKind, Resolvable, Resource, ResourceKind};
use cluster_atlas::{ClusterSnapshot, Node};

const WAIT: Duration = Duration::from_secs(5);

const BERLIN: &str = "Brandenburger Tor, Pariser Platz, Mitte, Berlin, 10117, Deutschland";
const BERLIN_SHORT: &str = "Brandenburger Tor, Pariser Platz, Mitte, Berlin";

/// Geocoder that always fails and counts its calls.
#[derive(Default)]
struct FailingGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for FailingGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Option<Place>, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EnrichmentError::Unavailable("geocoder offline".to_string()))
    }
}

/// Keeps every rejection frame it is handed.
#[derive(Default)]
struct RecordingRejections {
    frames: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl RejectionHandler for RecordingRejections {
    async fn on_rejection(&self, frame: &serde_json::Value) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}

fn capabilities(public_ip: &str) -> Capabilities {
    Capabilities {
        cpu: Arc::new(FixedScore::new(BenchmarkKind::Cpu, 42.0)),
        net: Arc::new(FixedScore::new(BenchmarkKind::Net, 100.0)),
        public_address: Arc::new(StaticAddress(public_ip.to_string())),
        geocoder: Arc::new(StaticGeocoder::new(BERLIN).with_country("de")),
        coordinates: Arc::new(FixedCoordinates::new(Some((52.5163, 13.3777)))),
    }
}

fn attach(cluster: &LoopbackCluster, id: &str, policy: StateConfig, capabilities: Capabilities) -> Node {
    let cluster = cluster.clone();
    let id = id.to_string();
    Node::assemble(policy, None, capabilities, move |callbacks| {
        Arc::new(cluster.attach(id, callbacks)) as Arc<dyn ClusterRuntime>
    })
}

async fn open(cluster: &LoopbackCluster, id: &str, capabilities: Capabilities) -> Node {
    let node = attach(cluster, id, StateConfig::default(), capabilities);
    node.session.open("{}").await.unwrap();
    node
}

fn workload(label: &str) -> Resource {
    Resource::new(
        ResourceKind::Workload,
        format!("Workload {label}"),
        label,
        serde_json::json!({ "image": "echo" }),
    )
}

async fn wait_for<F>(node: &Node, predicate: F) -> Arc<ClusterSnapshot>
where
    F: Fn(&ClusterSnapshot) -> bool,
{
    match node.cluster().wait_until(WAIT, predicate).await {
        Some(snapshot) => snapshot,
        None => panic!(
            "snapshot never matched; last seen: {:#?}",
            node.cluster().snapshot().cluster
        ),
    }
}

// ============================================================================
// Membership and benchmarks
// ============================================================================

#[tokio::test]
async fn test_three_peers_converge_on_scores_and_addresses() {
    let cluster = LoopbackCluster::new();
    let token = CancellationToken::new();
    let ids = ["a", "b", "c"];

    let mut nodes = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let node = attach(&cluster, id, StateConfig::default(), capabilities(&format!("203.0.113.{}", i + 1)));
        tokio::spawn(node.enricher.clone().run(token.clone()));
        node.session.open("{}").await.unwrap();
        nodes.push(node);
    }

    for node in &nodes {
        let snapshot = wait_for(node, |s| {
            s.cluster.nodes.len() == 3
                && ids.iter().all(|id| {
                    s.stats.compute.get(*id) == Some(&42.0)
                        && s.stats.networking.get(*id) == Some(&100.0)
                        && s.node(id).is_some_and(|n| n.public_address.known().is_some())
                })
        })
        .await;

        let summary = snapshot.stats.compute_summary.as_ref().unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 42.0).abs() < f64::EPSILON);
        assert_eq!(
            snapshot.node("b").unwrap().public_address,
            Resolvable::Known("203.0.113.2".to_string())
        );
        assert!(snapshot.local.public_ip.is_some());
    }

    token.cancel();
}

#[tokio::test]
async fn test_departed_peer_keeps_its_scores() {
    let cluster = LoopbackCluster::new();
    let a = open(&cluster, "a", capabilities("203.0.113.1")).await;
    let b = open(&cluster, "b", capabilities("203.0.113.2")).await;

    let published = b
        .enricher
        .publish_benchmark(&FixedScore::new(BenchmarkKind::Cpu, 7.0))
        .await
        .unwrap();
    assert!(published);
    wait_for(&a, |s| s.stats.compute.get("b") == Some(&7.0)).await;

    b.session.close().await.unwrap();
    let snapshot = wait_for(&a, |s| s.node("b").is_none()).await;
    assert_eq!(snapshot.cluster.nodes.len(), 1);
    assert_eq!(snapshot.stats.compute.get("b"), Some(&7.0));
    assert_eq!(cluster.members().await, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_producers_wait_for_an_open_session() {
    let cluster = LoopbackCluster::new();
    let node = attach(&cluster, "a", StateConfig::default(), capabilities("203.0.113.1"));

    assert!(!node.enricher.publish_public_address().await.unwrap());
    assert!(!node.enricher.refresh_location().await.unwrap());
    node.cluster().flush().await.unwrap();
    assert!(node.cluster().snapshot().local.public_ip.is_none());
}

// ============================================================================
// Workloads
// ============================================================================

#[tokio::test]
async fn test_workload_deletion_requests_one_restart() {
    let cluster = LoopbackCluster::new();
    let mut a = open(&cluster, "a", capabilities("203.0.113.1")).await;
    let _b = open(&cluster, "b", capabilities("203.0.113.2")).await;

    a.session.create_resources(vec![workload("w1")], "a").await.unwrap();
    let snapshot = wait_for(&a, |s| s.cluster.resources.len() == 1).await;
    assert_eq!(snapshot.cluster.resources[0].owner_node, "a");
    assert!(snapshot.graphs.cluster.node("Workload/w1").is_some());

    a.session.delete_resources(vec![workload("w1")], "a").await.unwrap();
    let signal = tokio::time::timeout(WAIT, a.restarts.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal.label, "w1");

    a.cluster().flush().await.unwrap();
    assert!(a.restarts.try_recv().is_err());
    assert!(a.cluster().snapshot().cluster.resources.is_empty());
}

#[tokio::test]
async fn test_deletion_scope_decides_who_may_remove() {
    for (scope, remaining) in [(DeletionScope::Owner, 1), (DeletionScope::Cluster, 0)] {
        let cluster = LoopbackCluster::new();
        let policy = StateConfig {
            deletion_scope: scope,
            ..StateConfig::default()
        };
        let mut a = attach(&cluster, "a", policy, capabilities("203.0.113.1"));
        a.session.open("{}").await.unwrap();
        let b = open(&cluster, "b", capabilities("203.0.113.2")).await;

        a.session.create_resources(vec![workload("w1")], "a").await.unwrap();
        wait_for(&a, |s| s.cluster.resources.len() == 1).await;

        // b deletes a resource a attributed to itself
        b.session.delete_resources(vec![workload("w1")], "a").await.unwrap();
        tokio::time::timeout(WAIT, a.restarts.recv())
            .await
            .unwrap()
            .unwrap();
        a.cluster().flush().await.unwrap();
        assert_eq!(
            a.cluster().snapshot().cluster.resources.len(),
            remaining,
            "scope {scope:?}"
        );
    }
}

#[tokio::test]
async fn test_unknown_target_is_rejected() {
    let cluster = LoopbackCluster::new();
    let a = open(&cluster, "a", capabilities("203.0.113.1")).await;

    a.session
        .create_resources(vec![workload("w1")], "nowhere")
        .await
        .unwrap();

    let snapshot = wait_for(&a, |s| {
        s.log.iter().any(|line| line.contains("Rejected resource:"))
    })
    .await;
    let line = snapshot
        .log
        .iter()
        .find(|line| line.contains("Rejected resource:"))
        .unwrap();
    assert!(line.contains("unknown node"));
    assert!(line.contains("nowhere"));
    assert!(snapshot.cluster.resources.is_empty());
}

#[tokio::test]
async fn test_rejection_frame_reaches_the_installed_handler() {
    let cluster = LoopbackCluster::new();
    let recorder = Arc::new(RecordingRejections::default());
    let runtime_cluster = cluster.clone();
    let a = Node::assemble_with_rejections(
        StateConfig::default(),
        None,
        capabilities("203.0.113.1"),
        recorder.clone(),
        move |callbacks| Arc::new(runtime_cluster.attach("a", callbacks)) as Arc<dyn ClusterRuntime>,
    );
    a.session.open("{}").await.unwrap();

    a.session
        .create_resources(vec![workload("w1")], "nowhere")
        .await
        .unwrap();
    a.cluster().flush().await.unwrap();

    let frames = recorder.frames.lock().unwrap().clone();
    assert_eq!(
        frames,
        vec![serde_json::json!({
            "action": "create",
            "target": "nowhere",
            "reason": "unknown node",
            "resources": [workload("w1")],
        })]
    );
}

#[tokio::test]
async fn test_seed_file_is_stored_by_the_runtime() {
    let cluster = LoopbackCluster::new();
    let a = open(&cluster, "a", capabilities("203.0.113.1")).await;

    a.session
        .seed_file("notes", "notes.txt", "default", b"hello".to_vec())
        .await
        .unwrap();

    let seeded = cluster.seeded("notes").await.unwrap();
    assert_eq!(seeded.seeder, "a");
    assert_eq!(seeded.name, "notes.txt");
    assert_eq!(seeded.bytes, b"hello");
}

// ============================================================================
// Location
// ============================================================================

#[tokio::test]
async fn test_location_resolves_on_every_observer() {
    let cluster = LoopbackCluster::new();
    let a = open(&cluster, "a", capabilities("203.0.113.1")).await;
    let b = open(&cluster, "b", capabilities("203.0.113.2")).await;

    assert!(a.enricher.refresh_location().await.unwrap());

    for node in [&a, &b] {
        let snapshot = wait_for(node, |s| {
            s.node("a").is_some_and(|n| n.location.known() == Some(BERLIN_SHORT))
        })
        .await;
        let located = snapshot.node("a").unwrap();
        assert!((located.latitude - 52.5163).abs() < 1e-9);
        assert!((located.longitude - 13.3777).abs() < 1e-9);
        assert_eq!(snapshot.node("b").unwrap().location, Resolvable::Loading);
    }

    a.cluster().flush().await.unwrap();
    let local = a.cluster().snapshot().local.clone();
    assert!(!local.location.loading);
    assert_eq!(local.location.address.as_deref(), Some(BERLIN));
    assert_eq!(local.location.flag.as_deref(), Some("🇩🇪"));
    let log = &a.cluster().snapshot().log;
    assert!(log.iter().any(|l| l.contains("Requested location")));
    assert!(log.iter().any(|l| l.contains("Resolved location")));
}

#[tokio::test]
async fn test_failed_geocoding_leaves_node_untouched() {
    let cluster = LoopbackCluster::new();
    let geocoder = Arc::new(FailingGeocoder::default());
    let a = open(&cluster, "a", capabilities("203.0.113.1")).await;
    let b = open(
        &cluster,
        "b",
        Capabilities {
            geocoder: geocoder.clone(),
            ..capabilities("203.0.113.2")
        },
    )
    .await;

    assert!(a.enricher.refresh_location().await.unwrap());

    let deadline = tokio::time::Instant::now() + WAIT;
    while geocoder.calls.load(Ordering::SeqCst) == 0 {
        assert!(tokio::time::Instant::now() < deadline, "geocoder never called");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    b.cluster().flush().await.unwrap();

    let snapshot = b.cluster().snapshot();
    let node = snapshot.node("a").unwrap();
    assert_eq!(node.location, Resolvable::Loading);
    assert_eq!((node.latitude, node.longitude), (0.0, 0.0));
}

#[tokio::test]
async fn test_empty_geocoder_answer_marks_location_unset() {
    let cluster = LoopbackCluster::new();
    let a = open(
        &cluster,
        "a",
        Capabilities {
            geocoder: Arc::new(StaticGeocoder::empty()),
            ..capabilities("203.0.113.1")
        },
    )
    .await;

    assert!(a.enricher.refresh_location().await.unwrap());
    let snapshot = wait_for(&a, |s| {
        s.node("a").is_some_and(|n| n.location == Resolvable::Unset)
    })
    .await;
    assert!((snapshot.node("a").unwrap().latitude - 52.5163).abs() < 1e-9);
    assert_eq!(snapshot.local.location.address, None);
    assert_eq!(snapshot.local.location.flag, None);
}

#[tokio::test]
async fn test_denied_location_falls_back_to_origin() {
    let cluster = LoopbackCluster::new();
    let a = open(
        &cluster,
        "a",
        Capabilities {
            coordinates: Arc::new(FixedCoordinates::new(None)),
            ..capabilities("203.0.113.1")
        },
    )
    .await;

    assert!(!a.enricher.refresh_location().await.unwrap());
    a.cluster().flush().await.unwrap();

    let snapshot = a.cluster().snapshot();
    assert!(!snapshot.local.location.loading);
    assert_eq!(
        (snapshot.local.location.latitude, snapshot.local.location.longitude),
        (0.0, 0.0)
    );
    assert!(snapshot.log.iter().any(|l| l.contains("Location access denied")));
    assert_eq!(snapshot.node("a").unwrap().location, Resolvable::Loading);
}
