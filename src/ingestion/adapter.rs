//! Runtime callback surface and its adapter onto the engine.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::ClusterEvent;
use crate::engine::ClusterHandle;
use crate::types::Resource;

// ============================================================================
// Callback contract
// ============================================================================

/// Handlers a cluster runtime invokes, one per event category.
///
/// Terminal hooks are part of the runtime contract but unsupported here; the
/// defaults only log.
#[async_trait]
pub trait RuntimeCallbacks: Send + Sync {
    async fn on_node_acknowledged(&self, id: &str);
    async fn on_node_joined(&self, id: &str);
    async fn on_node_left(&self, id: &str);
    async fn on_resource_peer_acknowledged(&self, metadata: Value, spec: Value, id: &str);
    async fn on_resource_peer_joined(&self, metadata: Value, spec: Value, id: &str);
    async fn on_resource_peer_left(&self, metadata: Value, spec: Value, id: &str);
    async fn on_resource_created(&self, node_id: &str, resource: Resource);
    async fn on_resource_deleted(&self, node_id: &str, resource: Resource);
    async fn on_resource_rejected(&self, frame: Value);

    async fn on_terminal_created(&self, id: &str) {
        info!(terminal = %id, "Creating terminal (STDOUT only)");
    }

    async fn on_terminal_output(&self, id: &str, message: &str) {
        info!(terminal = %id, message = %message, "Writing to terminal (STDOUT only)");
    }

    async fn on_terminal_deleted(&self, id: &str) {
        info!(terminal = %id, "Deleting terminal");
    }

    fn read_stdin(&self, id: &str) -> Option<String> {
        error!(terminal = %id, "STDIN is not supported on this node");
        None
    }
}

/// Receives rejection frames forwarded by the adapter.
#[async_trait]
pub trait RejectionHandler: Send + Sync {
    async fn on_rejection(&self, frame: &Value);
}

/// Default handler: log the frame.
pub struct LogRejections;

#[async_trait]
impl RejectionHandler for LogRejections {
    async fn on_rejection(&self, frame: &Value) {
        warn!(frame = %frame, "Resource rejected");
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Normalizes runtime callbacks into [`ClusterEvent`]s and queues them on the
/// engine. The engine logs every event it receives.
#[derive(Clone)]
pub struct EventAdapter {
    cluster: ClusterHandle,
    rejections: Arc<dyn RejectionHandler>,
}

impl EventAdapter {
    pub fn new(cluster: ClusterHandle) -> Self {
        Self {
            cluster,
            rejections: Arc::new(LogRejections),
        }
    }

    pub fn with_rejection_handler(mut self, handler: Arc<dyn RejectionHandler>) -> Self {
        self.rejections = handler;
        self
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    /// Route an already-normalized event through the matching callback.
    pub async fn deliver(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::NodeAcknowledged { id } => self.on_node_acknowledged(&id).await,
            ClusterEvent::NodeJoined { id } => self.on_node_joined(&id).await,
            ClusterEvent::NodeLeft { id } => self.on_node_left(&id).await,
            ClusterEvent::ResourcePeerAcknowledged { metadata, spec, id } => {
                self.on_resource_peer_acknowledged(metadata, spec, &id).await;
            }
            ClusterEvent::ResourcePeerJoined { metadata, spec, id } => {
                self.on_resource_peer_joined(metadata, spec, &id).await;
            }
            ClusterEvent::ResourcePeerLeft { metadata, spec, id } => {
                self.on_resource_peer_left(metadata, spec, &id).await;
            }
            ClusterEvent::ResourceCreated { node_id, resource } => {
                self.on_resource_created(&node_id, resource).await;
            }
            ClusterEvent::ResourceDeleted { node_id, resource } => {
                self.on_resource_deleted(&node_id, resource).await;
            }
            ClusterEvent::ResourceRejected { frame } => self.on_resource_rejected(frame).await,
        }
    }

    async fn dispatch(&self, event: ClusterEvent) {
        let name = event.name();
        debug!(event = name, "Ingesting runtime event");
        if let Err(e) = self.cluster.dispatch(event).await {
            error!(event = name, error = %e, "Could not queue runtime event");
        }
    }
}

#[async_trait]
impl RuntimeCallbacks for EventAdapter {
    async fn on_node_acknowledged(&self, id: &str) {
        self.dispatch(ClusterEvent::NodeAcknowledged { id: id.to_string() }).await;
    }

    async fn on_node_joined(&self, id: &str) {
        self.dispatch(ClusterEvent::NodeJoined { id: id.to_string() }).await;
    }

    async fn on_node_left(&self, id: &str) {
        self.dispatch(ClusterEvent::NodeLeft { id: id.to_string() }).await;
    }

    async fn on_resource_peer_acknowledged(&self, metadata: Value, spec: Value, id: &str) {
        self.dispatch(ClusterEvent::ResourcePeerAcknowledged {
            metadata,
            spec,
            id: id.to_string(),
        })
        .await;
    }

    async fn on_resource_peer_joined(&self, metadata: Value, spec: Value, id: &str) {
        self.dispatch(ClusterEvent::ResourcePeerJoined {
            metadata,
            spec,
            id: id.to_string(),
        })
        .await;
    }

    async fn on_resource_peer_left(&self, metadata: Value, spec: Value, id: &str) {
        self.dispatch(ClusterEvent::ResourcePeerLeft {
            metadata,
            spec,
            id: id.to_string(),
        })
        .await;
    }

    async fn on_resource_created(&self, node_id: &str, resource: Resource) {
        self.dispatch(ClusterEvent::ResourceCreated {
            node_id: node_id.to_string(),
            resource,
        })
        .await;
    }

    async fn on_resource_deleted(&self, node_id: &str, resource: Resource) {
        self.dispatch(ClusterEvent::ResourceDeleted {
            node_id: node_id.to_string(),
            resource,
        })
        .await;
    }

    async fn on_resource_rejected(&self, frame: Value) {
        self.dispatch(ClusterEvent::ResourceRejected { frame: frame.clone() }).await;
        self.rejections.on_rejection(&frame).await;
    }
}
