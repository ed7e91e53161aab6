//! Cluster membership graph.

use crate::types::{node_vertex_id, ClusterNode, Graph, GraphLink, GraphNode, NODE_GROUP};

/// One group-0 vertex per node and a directed full mesh between them.
///
/// The mesh expresses "every peer can reach every other peer"; it is not a
/// measured topology. N nodes yield N×(N−1) links of value 1.
pub fn build_network_graph(nodes: &[ClusterNode]) -> Graph {
    let vertices: Vec<GraphNode> = nodes
        .iter()
        .map(|node| GraphNode {
            id: node_vertex_id(&node.private_address),
            group: NODE_GROUP,
        })
        .collect();

    let mut links = Vec::with_capacity(vertices.len() * vertices.len().saturating_sub(1));
    for source in &vertices {
        for target in vertices.iter().filter(|candidate| candidate.id != source.id) {
            links.push(GraphLink::unit(&source.id, &target.id));
        }
    }

    Graph { nodes: vertices, links }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: usize) -> Vec<ClusterNode> {
        (0..n).map(|i| ClusterNode::placeholder(format!("10.0.0.{i}"))).collect()
    }

    #[test]
    fn test_full_mesh_sizes() {
        for n in 0..6 {
            let graph = build_network_graph(&roster(n));
            assert_eq!(graph.nodes.len(), n);
            assert_eq!(graph.links.len(), n * n.saturating_sub(1));
            assert!(graph.links.iter().all(|l| l.value == 1.0 && l.source != l.target));
            assert!(graph.nodes.iter().all(|v| v.group == NODE_GROUP));
        }
    }

    #[test]
    fn test_links_are_directed_both_ways() {
        let graph = build_network_graph(&roster(2));
        let pairs: Vec<(&str, &str)> = graph
            .links
            .iter()
            .map(|l| (l.source.as_str(), l.target.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Node/10.0.0.0", "Node/10.0.0.1"), ("Node/10.0.0.1", "Node/10.0.0.0")]
        );
    }
}
