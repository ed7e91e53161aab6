//! Graph construction.
//!
//! Pure, synchronous builders that turn the roster into renderable graphs:
//!
//! | Builder | Input | Output |
//! |---|---|---|
//! | [`build_resource_graph`] | resource roster, node id | node root + its resources |
//! | [`build_network_graph`] | node roster | directed full mesh of nodes |
//! | [`merge`] | resource graphs + network graph | deduplicated union |
//!
//! Vertex ids are `<Kind>/<label>`; nodes use the `Node` kind, so the root of
//! a resource graph and the matching network vertex share an id and collapse
//! during the merge.

mod groups;
mod merge;
mod network;
mod resource;

pub use groups::GroupRegistry;
pub use merge::merge;
pub use network::build_network_graph;
pub use resource::{build_resource_graph, resource_graph};
