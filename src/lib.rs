//! Cluster Atlas: live topology of a peer-to-peer compute cluster
//!
//! Consumes membership and resource lifecycle events from a cluster runtime,
//! keeps the node/resource rosters and benchmark scores, and derives graphs
//! for display after every event.
//!
//! ## Architecture
//!
//! - **Ingestion**: runtime callbacks and JSON-line sources become [`ClusterEvent`]s
//! - **Engine**: a single actor owns the [`state::ClusterState`] and publishes snapshots
//! - **Graph**: resource, network and merged graphs rebuilt per snapshot
//! - **Enrichment**: benchmarks, public address and location published as resources
//! - **Runtime**: in-process loopback cluster or a stdio bridge
//! - **API**: read-only HTTP view of the latest snapshot

pub mod api;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod graph;
pub mod ingestion;
pub mod node;
pub mod runtime;
pub mod state;
pub mod supervisor;
pub mod types;

pub use config::AtlasConfig;
pub use engine::{ClusterHandle, ClusterSnapshot, RestartSignal, Session};
pub use ingestion::{ClusterEvent, EventAdapter, RuntimeCallbacks};
pub use node::Node;
pub use runtime::{ClusterRuntime, LoopbackCluster, StdioRuntime};
pub use types::{ClusterNode, ClusterResource, Graph, Resource, ResourceKind};
