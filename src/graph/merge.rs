//! Combine resource graphs with the network graph.

use std::collections::HashSet;

use crate::types::Graph;

/// Merge resource graphs and a network graph into a fresh graph.
///
/// Vertices are taken in input order (resource graphs first, network graph
/// last) and deduplicated by id; the first occurrence wins, so its group is
/// the one that survives. Links are concatenated as-is, duplicates included.
pub fn merge(resource_graphs: &[Graph], network_graph: &Graph) -> Graph {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Graph::default();

    for graph in resource_graphs.iter().chain(std::iter::once(network_graph)) {
        for node in &graph.nodes {
            if seen.insert(node.id.as_str()) {
                merged.nodes.push(node.clone());
            }
        }
        merged.links.extend(graph.links.iter().cloned());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_network_graph;
    use crate::types::{ClusterNode, GraphLink, GraphNode};

    fn vertex(id: &str, group: u32) -> GraphNode {
        GraphNode { id: id.to_string(), group }
    }

    #[test]
    fn test_merge_without_resource_graphs_is_identity() {
        let nodes: Vec<ClusterNode> = ["a", "b", "c"].iter().map(|a| ClusterNode::placeholder(*a)).collect();
        let network = build_network_graph(&nodes);
        assert_eq!(merge(&[], &network), network);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let g1 = Graph {
            nodes: vec![vertex("Node/A", 0), vertex("File/x", 1)],
            links: vec![GraphLink::unit("Node/A", "File/x")],
        };
        let g2 = Graph {
            nodes: vec![vertex("Node/A", 0), vertex("File/x", 2)],
            links: vec![GraphLink::unit("Node/A", "File/x")],
        };
        let network = Graph {
            nodes: vec![vertex("Node/A", 0)],
            links: vec![],
        };

        let merged = merge(&[g1.clone(), g2.clone()], &network);
        assert_eq!(merged.nodes.iter().filter(|n| n.id == "Node/A").count(), 1);
        assert_eq!(merged.node("File/x").map(|n| n.group), Some(1));
        // duplicate edges are kept
        assert_eq!(merged.links.len(), 2);

        // inputs untouched
        assert_eq!(g1.nodes.len(), 2);
        assert_eq!(g2.nodes[1].group, 2);
    }

    #[test]
    fn test_vertex_order_is_resources_then_network() {
        let resources = Graph {
            nodes: vec![vertex("Node/A", 0), vertex("Workload/w", 1)],
            links: vec![GraphLink::unit("Node/A", "Workload/w")],
        };
        let nodes = vec![ClusterNode::placeholder("A"), ClusterNode::placeholder("B")];
        let network = build_network_graph(&nodes);

        let merged = merge(&[resources], &network);
        let ids: Vec<&str> = merged.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Node/A", "Workload/w", "Node/B"]);
        assert_eq!(merged.links.len(), 1 + 2);
    }
}
