//! Per-node resource graph: one node vertex plus its declared resources.

use tracing::warn;

use super::groups::GroupRegistry;
use crate::types::{vertex_id, ClusterResource, Graph, GraphLink, GraphNode, Resource, NODE_GROUP, NODE_KIND};

/// Build the resource graph of `node_id`.
///
/// Resources owned by `node_id` are re-read from their serialized payloads;
/// payloads that do not parse are left out. Vertices are emitted grouped by
/// kind in first-seen order, starting with the `Node/<node_id>` root. Every
/// group-0 vertex links to every other vertex with value 1; resources never
/// link to each other.
pub fn build_resource_graph(
    resources: &[ClusterResource],
    node_id: &str,
    groups: &mut GroupRegistry,
) -> Graph {
    // (kind, group, labels) in first-seen order
    let mut buckets: Vec<(String, u32, Vec<String>)> =
        vec![(NODE_KIND.to_string(), NODE_GROUP, vec![node_id.to_string()])];

    for entry in resources.iter().filter(|r| r.owner_node == node_id) {
        let resource: Resource = match serde_json::from_str(&entry.payload) {
            Ok(resource) => resource,
            Err(e) => {
                warn!(
                    node = %node_id,
                    kind = %entry.kind,
                    label = %entry.label,
                    error = %e,
                    "Skipping resource with unreadable payload"
                );
                continue;
            }
        };

        let kind = resource.kind.as_str();
        match buckets.iter_mut().find(|(k, _, _)| k == kind) {
            Some((_, _, labels)) => labels.push(resource.metadata.label),
            None => {
                let gid = groups.group_for(kind);
                buckets.push((kind.to_string(), gid, vec![resource.metadata.label]));
            }
        }
    }

    let nodes: Vec<GraphNode> = buckets
        .iter()
        .flat_map(|(kind, gid, labels)| {
            labels.iter().map(move |label| GraphNode {
                id: vertex_id(kind, label),
                group: *gid,
            })
        })
        .collect();

    let roots: Vec<&GraphNode> = nodes.iter().filter(|n| n.group == NODE_GROUP).collect();
    let links = nodes
        .iter()
        .filter(|n| n.group != NODE_GROUP)
        .flat_map(|n| roots.iter().map(move |root| GraphLink::unit(&root.id, &n.id)))
        .collect();

    Graph { nodes, links }
}

/// Resource graph with pass-local group numbering.
pub fn resource_graph(resources: &[ClusterResource], node_id: &str) -> Graph {
    build_resource_graph(resources, node_id, &mut GroupRegistry::new())
}
