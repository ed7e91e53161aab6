//! Core data model shared by the state store, graph builders and API.

pub mod cluster;
pub mod graph;
pub mod resource;

pub use cluster::{ClusterNode, ClusterResource, Connections, Resolvable};
pub use graph::{node_vertex_id, vertex_id, Graph, GraphLink, GraphNode, NODE_GROUP, NODE_KIND};
pub use resource::{
    BenchmarkKind, BenchmarkSpec, CoordinatesSpec, PublicIpSpec, Resource, ResourceKind,
    ResourceMetadata,
};
