//! Session facade: the commands a UI or binary issues against the runtime.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::{ClusterHandle, LocalUpdate};
use crate::runtime::ClusterRuntime;
use crate::types::Resource;

/// Pairs the engine with the runtime it observes.
#[derive(Clone)]
pub struct Session {
    cluster: ClusterHandle,
    runtime: Arc<dyn ClusterRuntime>,
}

impl Session {
    pub fn new(cluster: ClusterHandle, runtime: Arc<dyn ClusterRuntime>) -> Self {
        Self { cluster, runtime }
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    pub fn runtime(&self) -> &Arc<dyn ClusterRuntime> {
        &self.runtime
    }

    /// Store the configuration, open the runtime and mark the session opened.
    /// Returns once the opened snapshot is published.
    pub async fn open(&self, config: &str) -> Result<()> {
        self.cluster
            .update_local(LocalUpdate::Configured(config.to_string()))
            .await?;
        self.runtime
            .open(config)
            .await
            .context("Failed to open cluster runtime")?;
        self.cluster.update_local(LocalUpdate::Opened).await?;
        self.cluster.flush().await?;
        info!("Session opened");
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.runtime
            .close()
            .await
            .context("Failed to close cluster runtime")?;
        self.cluster.update_local(LocalUpdate::Closed).await?;
        info!("Session closed");
        Ok(())
    }

    pub async fn create_resources(&self, resources: Vec<Resource>, target: &str) -> Result<()> {
        self.runtime
            .create_resources(resources, target)
            .await
            .with_context(|| format!("Failed to create resources on {target}"))
    }

    pub async fn delete_resources(&self, resources: Vec<Resource>, target: &str) -> Result<()> {
        self.runtime
            .delete_resources(resources, target)
            .await
            .with_context(|| format!("Failed to delete resources on {target}"))
    }

    pub async fn seed_file(
        &self,
        label: &str,
        name: &str,
        repository: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.runtime
            .seed_file(label, name, repository, bytes)
            .await
            .with_context(|| format!("Failed to seed file {label}"))
    }
}
