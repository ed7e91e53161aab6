//! Renderable graph values.
//!
//! Graphs are plain owned data. Builders always return fresh values, so a
//! renderer that mutates its copy in place never affects the published
//! snapshot.

use serde::{Deserialize, Serialize};

/// Group id reserved for cluster nodes.
pub const NODE_GROUP: u32 = 0;

/// Kind prefix used for node ids (`Node/<address>`).
pub const NODE_KIND: &str = "Node";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub group: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

impl GraphLink {
    pub fn unit(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            value: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Composite id of a graph vertex: `<Kind>/<label>`.
pub fn vertex_id(kind: &str, label: &str) -> String {
    format!("{kind}/{label}")
}

/// Id of the vertex representing a cluster node.
pub fn node_vertex_id(private_address: &str) -> String {
    vertex_id(NODE_KIND, private_address)
}
