//! API request handlers. Every handler reads one published snapshot.

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use std::time::Instant;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::engine::ClusterHandle;

/// Shared state for the API handlers
#[derive(Clone)]
pub struct ApiState {
    pub cluster: ClusterHandle,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(cluster: ClusterHandle) -> Self {
        Self {
            cluster,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub snapshot_version: u64,
    pub local_node: Option<String>,
    pub opened: bool,
    pub nodes: usize,
    pub resources: usize,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        snapshot_version: snapshot.version,
        local_node: snapshot.local.node_id.clone(),
        opened: snapshot.local.opened,
        nodes: snapshot.cluster.nodes.len(),
        resources: snapshot.cluster.resources.len(),
    })
}

/// GET /api/v1/graphs
pub async fn get_graphs(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.graphs, snapshot.version)
}

/// GET /api/v1/graphs/cluster
pub async fn get_cluster_graph(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.graphs.cluster, snapshot.version)
}

/// GET /api/v1/graphs/network
pub async fn get_network_graph(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.graphs.network, snapshot.version)
}

/// GET /api/v1/graphs/resources
pub async fn get_resource_graph(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    match &snapshot.graphs.resources {
        Some(graph) => ApiResponse::from_snapshot(graph, snapshot.version),
        None => ApiErrorResponse::not_found("Local node identity not known yet"),
    }
}

/// GET /api/v1/graphs/local
pub async fn get_local_graph(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    match &snapshot.graphs.local {
        Some(graph) => ApiResponse::from_snapshot(graph, snapshot.version),
        None => ApiErrorResponse::not_found("Local node identity not known yet"),
    }
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.stats, snapshot.version)
}

/// GET /api/v1/cluster
pub async fn get_cluster(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.cluster, snapshot.version)
}

/// GET /api/v1/local
pub async fn get_local(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.local, snapshot.version)
}

/// GET /api/v1/log
pub async fn get_log(State(state): State<ApiState>) -> Response {
    let snapshot = state.cluster.snapshot();
    ApiResponse::from_snapshot(&snapshot.log, snapshot.version)
}
