//! Cluster roster types: nodes, visible resources and static connection data.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::resource::{Resource, ResourceKind};
use crate::config::defaults::DEFAULT_NODE_WEIGHT;

/// A node attribute that is filled in asynchronously by enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Resolvable {
    /// Placeholder until the first enrichment resource arrives.
    Loading,
    /// A lookup ran but produced nothing usable.
    Unset,
    Known(String),
}

impl Resolvable {
    pub fn known(&self) -> Option<&str> {
        match self {
            Self::Known(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("Loading"),
            Self::Unset => f.write_str("Not set"),
            Self::Known(value) => f.write_str(value),
        }
    }
}

/// A cluster member, keyed by its private address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub private_address: String,
    pub public_address: Resolvable,
    pub location: Resolvable,
    pub latitude: f64,
    pub longitude: f64,
    pub weight: u64,
}

impl ClusterNode {
    /// A freshly joined node with placeholder attributes.
    pub fn placeholder(private_address: impl Into<String>) -> Self {
        Self {
            private_address: private_address.into(),
            public_address: Resolvable::Loading,
            location: Resolvable::Loading,
            latitude: 0.0,
            longitude: 0.0,
            weight: DEFAULT_NODE_WEIGHT,
        }
    }
}

/// A visible (non state-mutating) resource in the roster.
///
/// `payload` keeps the serialized resource so graph builders can re-read it;
/// an unparseable payload is skipped during graph construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResource {
    pub kind: ResourceKind,
    pub name: String,
    pub label: String,
    pub owner_node: String,
    pub payload: String,
}

impl ClusterResource {
    pub fn from_resource(resource: &Resource, owner_node: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: resource.kind.clone(),
            name: resource.display_name().to_string(),
            label: resource.label().to_string(),
            owner_node: owner_node.to_string(),
            payload: serde_json::to_string(resource)?,
        })
    }

    /// Identity check on `(owner_node, kind, label)`.
    pub fn is(&self, owner_node: &str, kind: &ResourceKind, label: &str) -> bool {
        self.owner_node == owner_node && &self.kind == kind && self.label == label
    }
}

/// Static management/application connection matrices shown next to the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub management: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub application: Vec<Vec<Vec<f64>>>,
}
