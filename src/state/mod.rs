//! Cluster State Store
//!
//! The authoritative roster of nodes, visible resources and benchmark scores.
//! [`ClusterState::apply`] folds one [`ClusterEvent`] into the roster and
//! returns the side effects the caller has to perform; the store itself never
//! does I/O, so it is driven synchronously from the engine actor and from
//! tests alike.

mod log;
mod scores;

pub use log::EventLog;
pub use scores::{ScoreSummary, ScoreTable};

use tracing::{debug, error, info, warn};

use crate::config::defaults::LOCATION_COMPONENTS;
use crate::config::{DeletionScope, StateConfig};
use crate::ingestion::ClusterEvent;
use crate::types::{
    BenchmarkKind, BenchmarkSpec, ClusterNode, ClusterResource, CoordinatesSpec, PublicIpSpec,
    Resolvable, Resource, ResourceKind,
};

// ============================================================================
// Effects
// ============================================================================

/// Work the caller must carry out after applying an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Reverse-geocode the coordinates, then report back through
    /// [`ClusterState::apply_location`].
    Geocode {
        describes: String,
        latitude: f64,
        longitude: f64,
    },
    /// A workload was deleted; the process must restart.
    Restart { label: String },
    /// The roster grew; enrichment producers should publish again.
    RefreshEnrichment,
}

/// Result of a reverse-geocode lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Resolved(String),
    /// Lookup succeeded but produced no address.
    Empty,
    Failed(String),
}

// ============================================================================
// Cluster State
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClusterState {
    policy: StateConfig,
    local_id: Option<String>,
    /// Join order is kept; the cluster graph lists nodes in this order.
    nodes: Vec<ClusterNode>,
    resources: Vec<ClusterResource>,
    compute: ScoreTable,
    networking: ScoreTable,
    log: EventLog,
}

impl ClusterState {
    pub fn new(policy: StateConfig) -> Self {
        Self {
            policy,
            local_id: None,
            nodes: Vec::new(),
            resources: Vec::new(),
            compute: ScoreTable::new(),
            networking: ScoreTable::new(),
            log: EventLog::new(),
        }
    }

    // --- accessors -----------------------------------------------------------

    pub fn policy(&self) -> &StateConfig {
        &self.policy
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn node(&self, private_address: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.private_address == private_address)
    }

    pub fn resources(&self) -> &[ClusterResource] {
        &self.resources
    }

    pub fn compute_stats(&self) -> &ScoreTable {
        &self.compute
    }

    pub fn networking_stats(&self) -> &ScoreTable {
        &self.networking
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Append a free-form line to the event log.
    pub fn record(&mut self, message: impl AsRef<str>) {
        self.log.append(message);
    }

    // --- event application ---------------------------------------------------

    /// Apply one event. Every event is logged, whether or not it changes state.
    pub fn apply(&mut self, event: ClusterEvent) -> Vec<Effect> {
        self.log.append(event.log_line());
        debug!(event = event.name(), "Applying cluster event");

        match event {
            ClusterEvent::NodeAcknowledged { id } => {
                info!(node = %id, "Local node acknowledged");
                self.local_id = Some(id.clone());
                self.upsert_node(&id);
                vec![Effect::RefreshEnrichment]
            }
            ClusterEvent::NodeJoined { id } => {
                self.upsert_node(&id);
                vec![Effect::RefreshEnrichment]
            }
            ClusterEvent::ResourcePeerAcknowledged { id, .. }
            | ClusterEvent::ResourcePeerJoined { id, .. } => {
                self.upsert_node(&id);
                Vec::new()
            }
            ClusterEvent::NodeLeft { id } | ClusterEvent::ResourcePeerLeft { id, .. } => {
                self.remove_node(&id);
                Vec::new()
            }
            ClusterEvent::ResourceCreated { node_id, resource } => {
                self.on_resource_created(&node_id, &resource)
            }
            ClusterEvent::ResourceDeleted { node_id, resource } => {
                self.on_resource_deleted(&node_id, &resource)
            }
            ClusterEvent::ResourceRejected { frame } => {
                warn!(frame = %frame, "Resource rejected by runtime");
                Vec::new()
            }
        }
    }

    /// Apply the result of a reverse-geocode lookup to the described node.
    ///
    /// A failed lookup leaves the node untouched. Returns whether the roster
    /// changed.
    pub fn apply_location(
        &mut self,
        describes: &str,
        latitude: f64,
        longitude: f64,
        outcome: GeocodeOutcome,
    ) -> bool {
        let location = match outcome {
            GeocodeOutcome::Resolved(address) if !address.trim().is_empty() => {
                Resolvable::Known(shorten_address(&address))
            }
            GeocodeOutcome::Resolved(_) | GeocodeOutcome::Empty => Resolvable::Unset,
            GeocodeOutcome::Failed(reason) => {
                warn!(node = %describes, error = %reason, "Could not resolve node location");
                return false;
            }
        };

        let Some(node) = self.node_mut(describes) else {
            warn!(node = %describes, "Location resolved for unknown node");
            return false;
        };
        node.location = location;
        node.latitude = latitude;
        node.longitude = longitude;
        true
    }

    // --- roster helpers ------------------------------------------------------

    fn node_mut(&mut self, private_address: &str) -> Option<&mut ClusterNode> {
        self.nodes.iter_mut().find(|n| n.private_address == private_address)
    }

    fn upsert_node(&mut self, id: &str) -> bool {
        if self.node(id).is_some() {
            debug!(node = %id, "Node already known");
            return false;
        }
        let mut node = ClusterNode::placeholder(id);
        node.weight = self.policy.node_weight;
        self.nodes.push(node);
        info!(node = %id, nodes = self.nodes.len(), "Node joined");
        true
    }

    fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.private_address != id);
        let removed = self.nodes.len() != before;

        if removed {
            info!(node = %id, nodes = self.nodes.len(), "Node left");
            if self.policy.prune_scores_on_leave {
                self.compute.remove(id);
                self.networking.remove(id);
            }
        } else {
            debug!(node = %id, "Departure reported for unknown node");
        }
        removed
    }

    // --- resources -----------------------------------------------------------

    fn on_resource_created(&mut self, owner_id: &str, resource: &Resource) -> Vec<Effect> {
        match &resource.kind {
            ResourceKind::Coordinates => match resource.typed_spec::<CoordinatesSpec>() {
                Ok(spec) => vec![Effect::Geocode {
                    describes: spec.describes,
                    latitude: spec.latitude,
                    longitude: spec.longitude,
                }],
                Err(e) => {
                    error!(error = %e, "Malformed coordinates spec, ignoring");
                    Vec::new()
                }
            },
            ResourceKind::PublicIp => {
                match resource.typed_spec::<PublicIpSpec>() {
                    Ok(spec) => match self.node_mut(&spec.describes) {
                        Some(node) => node.public_address = Resolvable::Known(spec.public_ip),
                        None => warn!(node = %spec.describes, "Public address for unknown node"),
                    },
                    Err(e) => error!(error = %e, "Malformed public address spec, ignoring"),
                }
                Vec::new()
            }
            ResourceKind::BenchmarkScore => {
                match resource.typed_spec::<BenchmarkSpec>() {
                    Ok(spec) => match BenchmarkKind::parse(&spec.kind) {
                        Some(BenchmarkKind::Cpu) => self.compute.upsert(&spec.describes, spec.score),
                        Some(BenchmarkKind::Net) => self.networking.upsert(&spec.describes, spec.score),
                        None => error!(kind = %spec.kind, "Could not process unknown benchmark type"),
                    },
                    Err(e) => error!(error = %e, "Malformed benchmark spec, ignoring"),
                }
                Vec::new()
            }
            _ => {
                let Some(local_id) = self.local_id.clone() else {
                    warn!(
                        owner = %owner_id,
                        kind = %resource.kind,
                        label = %resource.label(),
                        "Resource created before local identity is known, ignoring"
                    );
                    return Vec::new();
                };
                self.upsert_resource(resource, &local_id);
                Vec::new()
            }
        }
    }

    fn upsert_resource(&mut self, resource: &Resource, owner: &str) {
        let entry = match ClusterResource::from_resource(resource, owner) {
            Ok(entry) => entry,
            Err(e) => {
                error!(error = %e, "Could not serialize resource, ignoring");
                return;
            }
        };

        match self
            .resources
            .iter_mut()
            .find(|r| r.is(owner, &resource.kind, resource.label()))
        {
            Some(existing) => {
                debug!(owner = %owner, kind = %resource.kind, label = %resource.label(), "Replacing resource");
                *existing = entry;
            }
            None => {
                info!(owner = %owner, kind = %resource.kind, label = %resource.label(), "Resource added");
                self.resources.push(entry);
            }
        }
    }

    fn on_resource_deleted(&mut self, owner_id: &str, resource: &Resource) -> Vec<Effect> {
        let scope = self.policy.deletion_scope;
        let kind = &resource.kind;
        let label = resource.label();

        let before = self.resources.len();
        self.resources.retain(|r| {
            let matches = match scope {
                DeletionScope::Owner => r.is(owner_id, kind, label),
                DeletionScope::Cluster => &r.kind == kind && r.label == label,
            };
            !matches
        });
        let removed = before - self.resources.len();
        info!(owner = %owner_id, kind = %kind, label = %label, removed, "Resource deleted");

        if *kind == ResourceKind::Workload {
            warn!(label = %label, "Workload deleted, restart required");
            vec![Effect::Restart {
                label: label.to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

/// Keep the leading address components of a geocoder answer.
fn shorten_address(address: &str) -> String {
    address
        .split(", ")
        .take(LOCATION_COMPONENTS)
        .collect::<Vec<_>>()
        .join(", ")
}
