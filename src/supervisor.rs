//! Task supervision shared by the binaries.
//!
//! Long-running tasks are spawned into a [`JoinSet`]; the supervisor waits on
//! them and cancels everything when one fails or panics.

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    HttpServer,
    Enricher,
    Locator,
    Peer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Enricher => write!(f, "Enricher"),
            TaskName::Locator => write!(f, "Locator"),
            TaskName::Peer => write!(f, "Peer"),
        }
    }
}

/// Initialize logging to stderr. `RUST_LOG` overrides the `info` default.
///
/// Stdout stays free for runtime commands.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Cancel `cancel_token` on Ctrl+C.
pub fn cancel_on_ctrl_c(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        cancel_token.cancel();
    });
}

/// Bind `addr` and spawn the HTTP server task into the JoinSet.
pub async fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    addr: &str,
    app: Router,
    cancel_token: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "API listening");

    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
    Ok(())
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
pub async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Wait for every remaining task after cancellation.
pub async fn drain(task_set: &mut JoinSet<Result<TaskName>>) {
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => info!("Supervisor: task {} stopped", task_name),
            Ok(Err(e)) => error!("Supervisor: task stopped with error: {}", e),
            Err(e) => error!("Supervisor: task panicked during shutdown: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_supervisor_cancels_on_failure() {
        let cancel_token = CancellationToken::new();
        let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
        task_set.spawn(async { Ok(TaskName::Locator) });
        task_set.spawn(async { Err(anyhow::anyhow!("boom")) });

        let result = run_supervisor(&mut task_set, cancel_token.clone()).await;
        assert!(result.is_err());
        assert!(cancel_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_supervisor_returns_when_all_tasks_finish() {
        let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
        task_set.spawn(async { Ok(TaskName::Enricher) });
        assert!(run_supervisor(&mut task_set, CancellationToken::new()).await.is_ok());
        assert!(task_set.is_empty());
    }
}
