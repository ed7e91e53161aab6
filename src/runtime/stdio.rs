//! Bridge to an out-of-process runtime: commands are written as JSON lines.
//!
//! Events travel the other way through [`StdinSource`](crate::ingestion::StdinSource).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::debug;

use super::{parse_config, ClusterRuntime, RuntimeError};
use crate::types::Resource;

/// One command line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RuntimeCommand {
    Open {
        config: Value,
    },
    Close,
    CreateResources {
        resources: Vec<Resource>,
        target: String,
    },
    DeleteResources {
        resources: Vec<Resource>,
        target: String,
    },
    SeedFile {
        label: String,
        name: String,
        repository: String,
        bytes: Vec<u8>,
    },
}

impl RuntimeCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close => "close",
            Self::CreateResources { .. } => "create_resources",
            Self::DeleteResources { .. } => "delete_resources",
            Self::SeedFile { .. } => "seed_file",
        }
    }
}

pub struct StdioRuntime<W = Stdout> {
    writer: Mutex<W>,
}

impl StdioRuntime<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> StdioRuntime<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn send(&self, command: RuntimeCommand) -> Result<(), RuntimeError> {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        debug!(command = command.name(), bytes = line.len(), "Runtime command written");
        Ok(())
    }
}

#[async_trait]
impl<W> ClusterRuntime for StdioRuntime<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn open(&self, config: &str) -> Result<(), RuntimeError> {
        let config = parse_config(config)?;
        self.send(RuntimeCommand::Open { config }).await
    }

    async fn close(&self) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::Close).await
    }

    async fn create_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::CreateResources {
            resources,
            target: target.to_string(),
        })
        .await
    }

    async fn delete_resources(&self, resources: Vec<Resource>, target: &str) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::DeleteResources {
            resources,
            target: target.to_string(),
        })
        .await
    }

    async fn seed_file(
        &self,
        label: &str,
        name: &str,
        repository: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::SeedFile {
            label: label.to_string(),
            name: name.to_string(),
            repository: repository.to_string(),
            bytes,
        })
        .await
    }
}
