//! In-process cluster: every attached peer shares one hub.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{parse_config, ClusterRuntime, RuntimeError};
use crate::ingestion::RuntimeCallbacks;
use crate::types::Resource;

/// A file offered through [`ClusterRuntime::seed_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededFile {
    pub name: String,
    pub repository: String,
    pub seeder: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct Hub {
    /// Open peers by id.
    peers: BTreeMap<String, Arc<dyn RuntimeCallbacks>>,
    files: HashMap<String, SeededFile>,
}

/// Shared membership of all loopback peers.
#[derive(Clone, Default)]
pub struct LoopbackCluster {
    hub: Arc<RwLock<Hub>>,
}

impl LoopbackCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime for peer `id` delivering its events to `callbacks`.
    pub fn attach(&self, id: impl Into<String>, callbacks: Arc<dyn RuntimeCallbacks>) -> LoopbackRuntime {
        LoopbackRuntime {
            id: id.into(),
            callbacks,
            cluster: self.clone(),
        }
    }

    /// Ids of the currently open peers.
    pub async fn members(&self) -> Vec<String> {
        self.hub.read().await.peers.keys().cloned().collect()
    }

    pub async fn seeded(&self, label: &str) -> Option<SeededFile> {
        self.hub.read().await.files.get(label).cloned()
    }
}

/// One peer's view of a [`LoopbackCluster`].
pub struct LoopbackRuntime {
    id: String,
    callbacks: Arc<dyn RuntimeCallbacks>,
    cluster: LoopbackCluster,
}

impl LoopbackRuntime {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn is_open(&self) -> bool {
        self.cluster.hub.read().await.peers.contains_key(&self.id)
    }

    async fn ensure_open(&self) -> Result<(), RuntimeError> {
        if self.is_open().await {
            Ok(())
        } else {
            Err(RuntimeError::NotOpen)
        }
    }

    async fn target(&self, target: &str) -> Option<Arc<dyn RuntimeCallbacks>> {
        self.cluster.hub.read().await.peers.get(target).cloned()
    }

    async fn reject(&self, action: &str, resources: &[Resource], target: &str) {
        warn!(peer = %self.id, target = %target, action, "Target node unknown, rejecting");
        let frame = json!({
            "action": action,
            "target": target,
            "reason": "unknown node",
            "resources": resources,
        });
        self.callbacks.on_resource_rejected(frame).await;
    }
}

#[async_trait]
impl ClusterRuntime for LoopbackRuntime {
    async fn open(&self, config: &str) -> Result<(), RuntimeError> {
        parse_config(config)?;

        // deliver after the lock is released; callbacks may call back in
        let others: Vec<(String, Arc<dyn RuntimeCallbacks>)> = {
            let mut hub = self.cluster.hub.write().await;
            if hub.peers.contains_key(&self.id) {
                return Err(RuntimeError::AlreadyOpen);
            }
            let others = hub
                .peers
                .iter()
                .map(|(id, callbacks)| (id.clone(), Arc::clone(callbacks)))
                .collect();
            hub.peers.insert(self.id.clone(), Arc::clone(&self.callbacks));
            others
        };

        info!(peer = %self.id, peers = others.len() + 1, "Loopback peer opened");
        self.callbacks.on_node_acknowledged(&self.id).await;
        for (other_id, other) in &others {
            self.callbacks.on_node_joined(other_id).await;
            other.on_node_joined(&self.id).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), RuntimeError> {
        let others: Vec<Arc<dyn RuntimeCallbacks>> = {
            let mut hub = self.cluster.hub.write().await;
            if hub.peers.remove(&self.id).is_none() {
                return Err(RuntimeError::NotOpen);
            }
            hub.peers.values().cloned().collect()
        };

        info!(peer = %self.id, "Loopback peer closed");
        for other in others {
            other.on_node_left(&self.id).await;
        }
        Ok(())
    }

    async fn create_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError> {
        self.ensure_open().await?;
        let Some(peer) = self.target(target).await else {
            self.reject("create", &resources, target).await;
            return Ok(());
        };

        debug!(peer = %self.id, target = %target, count = resources.len(), "Delivering created resources");
        for resource in resources {
            peer.on_resource_created(&self.id, resource).await;
        }
        Ok(())
    }

    async fn delete_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError> {
        self.ensure_open().await?;
        let Some(peer) = self.target(target).await else {
            self.reject("delete", &resources, target).await;
            return Ok(());
        };

        debug!(peer = %self.id, target = %target, count = resources.len(), "Delivering deleted resources");
        for resource in resources {
            peer.on_resource_deleted(&self.id, resource).await;
        }
        Ok(())
    }

    async fn seed_file(
        &self,
        label: &str,
        name: &str,
        repository: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RuntimeError> {
        self.ensure_open().await?;
        info!(peer = %self.id, label = %label, bytes = bytes.len(), "Seeding file");
        self.cluster.hub.write().await.files.insert(
            label.to_string(),
            SeededFile {
                name: name.to_string(),
                repository: repository.to_string(),
                seeder: self.id.clone(),
                bytes,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Records callback invocations as short strings.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RuntimeCallbacks for Recorder {
        async fn on_node_acknowledged(&self, id: &str) {
            self.push(format!("ack {id}"));
        }
        async fn on_node_joined(&self, id: &str) {
            self.push(format!("joined {id}"));
        }
        async fn on_node_left(&self, id: &str) {
            self.push(format!("left {id}"));
        }
        async fn on_resource_peer_acknowledged(&self, _metadata: Value, _spec: Value, _id: &str) {}
        async fn on_resource_peer_joined(&self, _metadata: Value, _spec: Value, _id: &str) {}
        async fn on_resource_peer_left(&self, _metadata: Value, _spec: Value, _id: &str) {}
        async fn on_resource_created(&self, node_id: &str, resource: Resource) {
            self.push(format!("created {}@{node_id}", resource.label()));
        }
        async fn on_resource_deleted(&self, node_id: &str, resource: Resource) {
            self.push(format!("deleted {}@{node_id}", resource.label()));
        }
        async fn on_resource_rejected(&self, frame: Value) {
            self.push(format!("rejected {}", frame["target"].as_str().unwrap_or_default()));
        }
    }

    #[tokio::test]
    async fn test_membership_notifications() {
        let cluster = LoopbackCluster::new();
        let (ra, rb) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let a = cluster.attach("a", ra.clone());
        let b = cluster.attach("b", rb.clone());

        a.open("{}").await.unwrap();
        b.open("{}").await.unwrap();
        assert_eq!(cluster.members().await, vec!["a", "b"]);

        b.close().await.unwrap();
        assert_eq!(ra.calls(), vec!["ack a", "joined b", "left b"]);
        assert_eq!(rb.calls(), vec!["ack b", "joined a"]);
        assert!(matches!(b.close().await, Err(RuntimeError::NotOpen)));
    }

    #[tokio::test]
    async fn test_open_twice_and_bad_config() {
        let cluster = LoopbackCluster::new();
        let a = cluster.attach("a", Arc::new(Recorder::default()));
        assert!(matches!(a.open("not json").await, Err(RuntimeError::Config(_))));
        a.open("{}").await.unwrap();
        assert!(matches!(a.open("{}").await, Err(RuntimeError::AlreadyOpen)));
    }

    #[tokio::test]
    async fn test_resources_reach_target_or_are_rejected() {
        let cluster = LoopbackCluster::new();
        let (ra, rb) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let a = cluster.attach("a", ra.clone());
        let b = cluster.attach("b", rb.clone());
        a.open("{}").await.unwrap();
        b.open("{}").await.unwrap();

        let file = Resource::new("File".into(), "f", "f1", serde_json::json!({}));
        a.create_resources(vec![file.clone()], "b").await.unwrap();
        a.delete_resources(vec![file.clone()], "b").await.unwrap();
        a.create_resources(vec![file], "zz").await.unwrap();

        assert_eq!(rb.calls(), vec!["ack b", "joined a", "created f1@a", "deleted f1@a"]);
        assert_eq!(ra.calls().last().map(String::as_str), Some("rejected zz"));
    }

    #[tokio::test]
    async fn test_commands_require_open_runtime() {
        let cluster = LoopbackCluster::new();
        let a = cluster.attach("a", Arc::new(Recorder::default()));
        assert!(matches!(
            a.create_resources(Vec::new(), "a").await,
            Err(RuntimeError::NotOpen)
        ));
        assert!(matches!(
            a.seed_file("l", "n", "r", vec![1]).await,
            Err(RuntimeError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_seed_file() {
        let cluster = LoopbackCluster::new();
        let a = cluster.attach("a", Arc::new(Recorder::default()));
        a.open("{}").await.unwrap();
        a.seed_file("wasm", "app.wasm", "default", vec![0, 97, 115, 109]).await.unwrap();

        let file = cluster.seeded("wasm").await.unwrap();
        assert_eq!(file.seeder, "a");
        assert_eq!(file.bytes.len(), 4);
        assert!(cluster.seeded("missing").await.is_none());
    }
}
