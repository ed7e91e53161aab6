//! API route definitions
//!
//! - /api/v1/health - liveness plus a roster summary
//! - /api/v1/graphs[/cluster|/network|/resources|/local] - derived graphs
//! - /api/v1/stats - benchmark score tables and summaries
//! - /api/v1/cluster - connections, node and resource rosters
//! - /api/v1/local - the local node's own view
//! - /api/v1/log - timestamped event log

use axum::{routing::get, Router};

use super::handlers::{self, ApiState};

/// Create all read-only API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/graphs", get(handlers::get_graphs))
        .route("/graphs/cluster", get(handlers::get_cluster_graph))
        .route("/graphs/network", get(handlers::get_network_graph))
        .route("/graphs/resources", get(handlers::get_resource_graph))
        .route("/graphs/local", get(handlers::get_local_graph))
        .route("/stats", get(handlers::get_stats))
        .route("/cluster", get(handlers::get_cluster))
        .route("/local", get(handlers::get_local))
        .route("/log", get(handlers::get_log))
        .with_state(state)
}
