//! Loopback Cluster Simulation
//!
//! Runs several observing peers inside one process on a shared loopback
//! runtime. Every peer benchmarks itself and broadcasts the results, so each
//! peer's snapshot converges on the same roster and score tables. The first
//! peer serves the HTTP API.
//!
//! # Usage
//! ```bash
//! # Three peers with fixed capabilities, API on :8080
//! ./simulation --offline
//!
//! # Five peers; the first deletes its workload every 30 s and restarts
//! ./simulation --peers 5 --offline --workloads --churn-secs 30
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cluster_atlas::api::{create_app, ApiState};
use cluster_atlas::config::{self, defaults, AtlasConfig};
use cluster_atlas::enrichment::{
    Capabilities, FixedCoordinates, FixedScore, StaticAddress, StaticGeocoder,
};
use cluster_atlas::runtime::{ClusterRuntime, LoopbackCluster};
use cluster_atlas::supervisor::{self, TaskName};
use cluster_atlas::types::{BenchmarkKind, Connections, Resource, ResourceKind};
use cluster_atlas::Node;

/// Places handed out to offline peers: (address, country, latitude, longitude).
const PLACES: [(&str, &str, f64, f64); 4] = [
    ("Brandenburger Tor, Pariser Platz, Mitte, Berlin, 10117, Deutschland", "de", 52.5163, 13.3777),
    ("Marienplatz, Altstadt, München, Bayern, 80331, Deutschland", "de", 48.1374, 11.5755),
    ("Stephansplatz, Innere Stadt, Wien, 1010, Österreich", "at", 48.2085, 16.3721),
    ("Bundesplatz, Bern, 3011, Schweiz", "ch", 46.9470, 7.4440),
];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(name = "simulation")]
#[command(about = "In-process loopback cluster for Cluster Atlas")]
#[command(version)]
struct Args {
    /// Number of peers
    #[arg(short, long, default_value_t = defaults::SIMULATION_PEERS)]
    peers: usize,

    /// Path to the TOML configuration (overrides ATLAS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API bind address of the first peer
    #[arg(short, long)]
    addr: Option<String>,

    /// Use fixed capabilities instead of HTTP lookups and real benchmarks
    #[arg(long)]
    offline: bool,

    /// Every peer creates one workload on itself after opening
    #[arg(long)]
    workloads: bool,

    /// The first peer deletes its workload after this many seconds
    #[arg(long, requires = "workloads")]
    churn_secs: Option<u64>,

    /// Every peer looks up and publishes its location after opening
    #[arg(long)]
    locate: bool,

    /// File the first peer seeds into the cluster
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Seconds between roster reports of the first peer
    #[arg(long, default_value_t = 5)]
    report_secs: u64,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn peer_id(index: usize) -> String {
    format!("10.42.0.{}", index + 1)
}

fn workload(peer: &str) -> Resource {
    Resource::new(
        ResourceKind::Workload,
        format!("Workload of {peer}"),
        format!("workload-{}", peer.replace('.', "-")),
        serde_json::json!({ "image": "registry.local/echo:latest", "replicas": 1 }),
    )
}

fn offline_capabilities(index: usize) -> Capabilities {
    let mut rng = rand::thread_rng();
    let (address, country, latitude, longitude) = PLACES[index % PLACES.len()];
    Capabilities {
        cpu: Arc::new(FixedScore::new(BenchmarkKind::Cpu, rng.gen_range(500.0..5_000.0))),
        net: Arc::new(FixedScore::new(BenchmarkKind::Net, rng.gen_range(10.0..900.0))),
        public_address: Arc::new(StaticAddress(format!("2001:db8::{:x}", index + 1))),
        geocoder: Arc::new(StaticGeocoder::new(address).with_country(country)),
        coordinates: Arc::new(FixedCoordinates::new(Some((latitude, longitude)))),
    }
}

// ============================================================================
// Peer
// ============================================================================

struct Peer {
    index: usize,
    id: String,
    cluster: LoopbackCluster,
    capabilities: Capabilities,
    connections: Option<Connections>,
    args: Args,
}

impl Peer {
    fn serves_api(&self) -> bool {
        self.index == 0
    }

    /// Run sessions until cancelled; a workload deletion starts a new one.
    async fn run(self, cancel_token: CancellationToken) -> Result<TaskName> {
        let mut sessions = 0u32;
        while !cancel_token.is_cancelled() {
            sessions += 1;
            info!(peer = %self.id, session = sessions, "Opening session");
            if let Some(label) = self.run_session(cancel_token.clone()).await? {
                info!(peer = %self.id, workload = %label, "Starting a fresh session");
            }
        }
        Ok(TaskName::Peer)
    }

    /// Returns the deleted workload's label when a restart was requested.
    async fn run_session(&self, cancel_token: CancellationToken) -> Result<Option<String>> {
        let config = config::get();
        let session_token = cancel_token.child_token();
        let cluster = self.cluster.clone();
        let id = self.id.clone();

        let mut node = Node::assemble(
            config.state.clone(),
            self.connections.clone(),
            self.capabilities.clone(),
            move |callbacks| Arc::new(cluster.attach(id, callbacks)) as Arc<dyn ClusterRuntime>,
        );

        let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
        if self.serves_api() {
            let addr = self.args.addr.as_deref().unwrap_or(&config.server.addr);
            let app = create_app(ApiState::new(node.cluster().clone()));
            supervisor::spawn_http_server(&mut task_set, addr, app, session_token.clone()).await?;
            spawn_reporter(&mut task_set, &node, self.args.report_secs, session_token.clone());
        }

        let enricher = node.enricher.clone();
        let enricher_token = session_token.clone();
        task_set.spawn(async move {
            enricher.run(enricher_token).await;
            Ok(TaskName::Enricher)
        });

        node.session.open("{}").await?;

        if self.args.workloads {
            node.session
                .create_resources(vec![workload(&self.id)], &self.id)
                .await?;
        }
        if self.args.locate {
            node.enricher.refresh_location().await?;
        }
        if self.serves_api() {
            if let Some(path) = &self.args.seed {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                node.session.seed_file(&name, &name, "default", bytes).await?;
            }
            if let Some(secs) = self.args.churn_secs {
                let session = node.session.clone();
                let id = self.id.clone();
                task_set.spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    session.delete_resources(vec![workload(&id)], &id).await?;
                    Ok(TaskName::Peer)
                });
            }
        }

        let end = tokio::select! {
            Some(signal) = node.restarts.recv() => Ok(Some(signal.label)),
            result = supervisor::run_supervisor(&mut task_set, session_token.clone()) => {
                result.map(|()| None)
            }
        };

        session_token.cancel();
        if let Err(e) = node.session.close().await {
            warn!(peer = %self.id, "Could not close session: {:#}", e);
        }
        supervisor::drain(&mut task_set).await;
        end
    }
}

/// Periodically log the first peer's view of the cluster.
fn spawn_reporter(
    task_set: &mut JoinSet<Result<TaskName>>,
    node: &Node,
    every_secs: u64,
    cancel_token: CancellationToken,
) {
    let cluster = node.cluster().clone();
    task_set.spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    let snapshot = cluster.snapshot();
                    info!(
                        version = snapshot.version,
                        nodes = snapshot.cluster.nodes.len(),
                        resources = snapshot.cluster.resources.len(),
                        graph_nodes = snapshot.graphs.cluster.nodes.len(),
                        graph_links = snapshot.graphs.cluster.links.len(),
                        cpu_mean = snapshot.stats.compute_summary.as_ref().map(|s| s.mean),
                        net_mean = snapshot.stats.networking_summary.as_ref().map(|s| s.mean),
                        "Cluster report"
                    );
                }
            }
        }
        Ok(TaskName::Peer)
    });
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    supervisor::init_tracing(args.log_json);

    let atlas_config = match &args.config {
        Some(path) => AtlasConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AtlasConfig::load(),
    };
    config::init(atlas_config);
    let config = config::get();
    let connections = config.server.load_connections()?;

    info!(peers = args.peers, offline = args.offline, "Starting loopback simulation");

    let cancel_token = CancellationToken::new();
    supervisor::cancel_on_ctrl_c(cancel_token.clone());

    let cluster = LoopbackCluster::new();
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    for index in 0..args.peers {
        let capabilities = if args.offline {
            offline_capabilities(index)
        } else {
            Capabilities::from_config(&config.enrichment)
                .context("Failed to build enrichment capabilities")?
        };
        let peer = Peer {
            index,
            id: peer_id(index),
            cluster: cluster.clone(),
            capabilities,
            connections: connections.clone(),
            args: args.clone(),
        };
        task_set.spawn(peer.run(cancel_token.clone()));
    }

    supervisor::run_supervisor(&mut task_set, cancel_token.clone()).await?;
    cancel_token.cancel();
    supervisor::drain(&mut task_set).await;

    info!("Simulation shutdown complete");
    Ok(())
}
