//! Immutable views published by the engine after every applied command.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::GroupIdPolicy;
use crate::graph::{build_network_graph, build_resource_graph, merge, GroupRegistry};
use crate::state::{ClusterState, EventLog, ScoreSummary};
use crate::types::{ClusterNode, ClusterResource, Connections, Graph};

/// Complete, self-consistent view of the engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterSnapshot {
    /// Incremented on every publish.
    pub version: u64,
    pub graphs: Graphs,
    pub stats: Stats,
    pub cluster: ClusterView,
    pub local: LocalView,
    pub log: EventLog,
}

impl ClusterSnapshot {
    /// Private addresses of every known node, the local one included.
    pub fn peers(&self) -> Vec<String> {
        self.cluster
            .nodes
            .iter()
            .map(|n| n.private_address.clone())
            .collect()
    }

    pub fn node(&self, private_address: &str) -> Option<&ClusterNode> {
        self.cluster
            .nodes
            .iter()
            .find(|n| n.private_address == private_address)
    }

    /// Enrichment may run: local identity known and runtime open.
    pub fn enrichment_ready(&self) -> bool {
        self.local.node_id.is_some() && self.local.opened
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Graphs {
    /// Every node's resource graph merged with the network graph.
    pub cluster: Graph,
    pub network: Graph,
    /// Resource graph of the local node, once its identity is known.
    pub resources: Option<Graph>,
    /// Local resource graph merged with the network graph.
    pub local: Option<Graph>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub compute: BTreeMap<String, f64>,
    pub networking: BTreeMap<String, f64>,
    pub compute_summary: Option<ScoreSummary>,
    pub networking_summary: Option<ScoreSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterView {
    pub connections: Option<Connections>,
    pub nodes: Vec<ClusterNode>,
    pub resources: Vec<ClusterResource>,
}

/// Facts about this process's own node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalView {
    pub node_id: Option<String>,
    pub node_config: Option<String>,
    pub opened: bool,
    pub public_ip: Option<String>,
    pub location: LocalLocation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalLocation {
    pub loading: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    /// Country flag emoji of the resolved address.
    pub flag: Option<String>,
}

// ============================================================================
// Graph derivation
// ============================================================================

/// Rebuilds all graphs from the roster, honouring the group id policy.
#[derive(Debug)]
pub struct GraphDeriver {
    policy: GroupIdPolicy,
    registry: GroupRegistry,
}

impl GraphDeriver {
    pub fn new(policy: GroupIdPolicy) -> Self {
        Self {
            policy,
            registry: GroupRegistry::new(),
        }
    }

    fn resource_graph(&mut self, resources: &[ClusterResource], node_id: &str) -> Graph {
        match self.policy {
            GroupIdPolicy::PerPass => {
                build_resource_graph(resources, node_id, &mut GroupRegistry::new())
            }
            GroupIdPolicy::Stable => build_resource_graph(resources, node_id, &mut self.registry),
        }
    }

    pub fn derive(&mut self, state: &ClusterState) -> Graphs {
        let resources = state.resources();
        let network = build_network_graph(state.nodes());

        let local_resources = state
            .local_id()
            .map(|id| self.resource_graph(resources, id));
        let local = local_resources
            .as_ref()
            .map(|graph| merge(std::slice::from_ref(graph), &network));

        let per_node: Vec<Graph> = state
            .nodes()
            .iter()
            .map(|node| self.resource_graph(resources, &node.private_address))
            .collect();
        let cluster = merge(&per_node, &network);

        Graphs {
            cluster,
            network,
            resources: local_resources,
            local,
        }
    }
}

pub(crate) fn stats_of(state: &ClusterState) -> Stats {
    Stats {
        compute: state.compute_stats().as_map().clone(),
        networking: state.networking_stats().as_map().clone(),
        compute_summary: state.compute_stats().summary(),
        networking_summary: state.networking_stats().summary(),
    }
}
