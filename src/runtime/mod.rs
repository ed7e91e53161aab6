//! Cluster runtime seam.
//!
//! The runtime owns peer discovery and transport; this crate only issues
//! commands to it and consumes the events it delivers through
//! [`RuntimeCallbacks`](crate::ingestion::RuntimeCallbacks).
//!
//! - [`LoopbackCluster`]: every peer lives in this process
//! - [`StdioRuntime`]: commands go out as JSON lines, events come back on stdin

mod loopback;
mod stdio;

pub use loopback::{LoopbackCluster, LoopbackRuntime, SeededFile};
pub use stdio::{RuntimeCommand, StdioRuntime};

use async_trait::async_trait;

use crate::types::Resource;

/// Runtime errors
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Runtime is not open")]
    NotOpen,
    #[error("Runtime is already open")]
    AlreadyOpen,
    #[error("Invalid node configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Commands accepted by a cluster runtime.
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    /// Join the cluster with the given JSON node configuration.
    async fn open(&self, config: &str) -> Result<(), RuntimeError>;

    async fn close(&self) -> Result<(), RuntimeError>;

    /// Ask `target` to create `resources`.
    async fn create_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError>;

    /// Ask `target` to delete `resources`.
    async fn delete_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError>;

    /// Offer a file to the cluster under `label`.
    async fn seed_file(
        &self,
        label: &str,
        name: &str,
        repository: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RuntimeError>;
}

/// Node configurations are JSON documents.
pub(crate) fn parse_config(config: &str) -> Result<serde_json::Value, RuntimeError> {
    serde_json::from_str(config).map_err(|e| RuntimeError::Config(e.to_string()))
}
