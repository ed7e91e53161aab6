//! Uniform event type produced from runtime callbacks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Resource;

/// A normalized runtime event.
///
/// The serde representation (`{"event": "node_joined", "id": "..."}`) is also
/// the line format read by [`StdinSource`](super::StdinSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClusterEvent {
    /// The runtime acknowledged this process; `id` is the local identity.
    NodeAcknowledged { id: String },
    NodeJoined { id: String },
    NodeLeft { id: String },
    /// A resource-class peer acknowledged us. Treated as a join.
    ResourcePeerAcknowledged {
        #[serde(default)]
        metadata: Value,
        #[serde(default)]
        spec: Value,
        id: String,
    },
    ResourcePeerJoined {
        #[serde(default)]
        metadata: Value,
        #[serde(default)]
        spec: Value,
        id: String,
    },
    ResourcePeerLeft {
        #[serde(default)]
        metadata: Value,
        #[serde(default)]
        spec: Value,
        id: String,
    },
    ResourceCreated { node_id: String, resource: Resource },
    ResourceDeleted { node_id: String, resource: Resource },
    ResourceRejected { frame: Value },
}

impl ClusterEvent {
    /// Human-readable line for the event log.
    pub fn log_line(&self) -> String {
        match self {
            Self::NodeAcknowledged { id } => format!("Management node acknowledged: {id}"),
            Self::NodeJoined { id } => format!("Management node joined: {id}"),
            Self::NodeLeft { id } => format!("Management node left: {id}"),
            Self::ResourcePeerAcknowledged { metadata, spec, id } => {
                format!("Resource node acknowledged: {metadata}, {spec}, {id}")
            }
            Self::ResourcePeerJoined { metadata, spec, id } => {
                format!("Resource node joined: {metadata}, {spec}, {id}")
            }
            Self::ResourcePeerLeft { metadata, spec, id } => {
                format!("Resource node left: {metadata}, {spec}, {id}")
            }
            Self::ResourceCreated { node_id, resource } => {
                format!("Created resource: {}@{node_id}", to_json(resource))
            }
            Self::ResourceDeleted { node_id, resource } => {
                format!("Deleted resource: {}@{node_id}", to_json(resource))
            }
            Self::ResourceRejected { frame } => format!("Rejected resource: {frame}"),
        }
    }

    /// Short variant name for structured logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NodeAcknowledged { .. } => "node_acknowledged",
            Self::NodeJoined { .. } => "node_joined",
            Self::NodeLeft { .. } => "node_left",
            Self::ResourcePeerAcknowledged { .. } => "resource_peer_acknowledged",
            Self::ResourcePeerJoined { .. } => "resource_peer_joined",
            Self::ResourcePeerLeft { .. } => "resource_peer_left",
            Self::ResourceCreated { .. } => "resource_created",
            Self::ResourceDeleted { .. } => "resource_deleted",
            Self::ResourceRejected { .. } => "resource_rejected",
        }
    }
}

fn to_json(resource: &Resource) -> String {
    serde_json::to_string(resource).unwrap_or_else(|_| format!("{}/{}", resource.kind, resource.label()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[test]
    fn test_wire_format() {
        let line = r#"{"event":"node_joined","id":"10.0.0.2"}"#;
        let event: ClusterEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event, ClusterEvent::NodeJoined { id: "10.0.0.2".into() });

        let line = r#"{"event":"resource_peer_left","id":"10.0.0.3"}"#;
        let event: ClusterEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.name(), "resource_peer_left");
    }

    #[test]
    fn test_log_lines() {
        let resource = Resource::new(ResourceKind::Workload, "w", "w1", serde_json::json!({}));
        let line = ClusterEvent::ResourceCreated {
            node_id: "a".into(),
            resource,
        }
        .log_line();
        assert!(line.starts_with("Created resource: {"));
        assert!(line.ends_with("}@a"));

        let line = ClusterEvent::NodeLeft { id: "b".into() }.log_line();
        assert_eq!(line, "Management node left: b");
    }
}
