//! Cluster Atlas - stdio bridge to an external cluster runtime
//!
//! Runtime events arrive as JSON lines on stdin, runtime commands leave as
//! JSON lines on stdout, and the latest snapshot is served over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Bridge a runtime over pipes
//! runtime-daemon | ./cluster-atlas --node-config '{"signaler": "wss://..."}' | runtime-daemon-commands
//!
//! # Replay a recorded event stream without serving the API
//! ./cluster-atlas --no-api < events.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `ATLAS_CONFIG`: Path to the TOML configuration
//! - `ATLAS_CORS_ORIGINS`: Comma-separated origins allowed to query the API
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cluster_atlas::api::{create_app, ApiState};
use cluster_atlas::config::{self, AtlasConfig};
use cluster_atlas::enrichment::Capabilities;
use cluster_atlas::ingestion::{pump, StdinSource};
use cluster_atlas::runtime::{ClusterRuntime, StdioRuntime};
use cluster_atlas::supervisor::{self, TaskName};
use cluster_atlas::types::Connections;
use cluster_atlas::Node;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cluster-atlas")]
#[command(about = "Cluster Atlas - live topology of a peer-to-peer compute cluster")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML configuration (overrides ATLAS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON node configuration passed to the runtime on open
    #[arg(long, env = "ATLAS_NODE_CONFIG", default_value = "{}")]
    node_config: String,

    /// Override the API bind address
    #[arg(short, long)]
    addr: Option<String>,

    /// Do not serve the HTTP API
    #[arg(long)]
    no_api: bool,

    /// Look up and publish this node's location after opening
    #[arg(long)]
    locate: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// Why a session ended.
enum SessionEnd {
    Shutdown,
    Restart(String),
}

fn load_config(path: Option<&PathBuf>) -> Result<AtlasConfig> {
    let config = match path {
        Some(path) => AtlasConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AtlasConfig::load(),
    };
    for problem in config.validate() {
        warn!("Config: {}", problem);
    }
    Ok(config)
}

// ============================================================================
// Session Runner
// ============================================================================

/// Run one session until shutdown, end of input or a restart request.
async fn run_session(
    args: &CliArgs,
    source: &mut StdinSource,
    capabilities: &Capabilities,
    connections: Option<Connections>,
    cancel_token: CancellationToken,
) -> Result<SessionEnd> {
    let config = config::get();
    let session_token = cancel_token.child_token();

    let mut node = Node::assemble(
        config.state.clone(),
        connections,
        capabilities.clone(),
        |_callbacks| Arc::new(StdioRuntime::stdout()) as Arc<dyn ClusterRuntime>,
    );

    info!("Supervisor: initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    if !args.no_api {
        let addr = args.addr.as_deref().unwrap_or(&config.server.addr);
        let app = create_app(ApiState::new(node.cluster().clone()));
        supervisor::spawn_http_server(&mut task_set, addr, app, session_token.clone()).await?;
    }

    let enricher = node.enricher.clone();
    let enricher_token = session_token.clone();
    task_set.spawn(async move {
        enricher.run(enricher_token).await;
        Ok(TaskName::Enricher)
    });

    node.session.open(&args.node_config).await?;

    if args.locate {
        let enricher = node.enricher.clone();
        task_set.spawn(async move {
            enricher.refresh_location().await?;
            Ok(TaskName::Locator)
        });
    }

    let end = tokio::select! {
        delivered = pump(source, &node.adapter, session_token.clone()) => {
            info!(delivered, "Runtime event stream ended");
            Ok(SessionEnd::Shutdown)
        }
        Some(signal) = node.restarts.recv() => {
            warn!(workload = %signal.label, "Workload deleted, restarting session");
            Ok(SessionEnd::Restart(signal.label))
        }
        result = supervisor::run_supervisor(&mut task_set, session_token.clone()) => {
            result.map(|()| SessionEnd::Shutdown)
        }
    };

    session_token.cancel();
    if let Err(e) = node.session.close().await {
        warn!("Could not close session: {:#}", e);
    }
    supervisor::drain(&mut task_set).await;
    end
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    supervisor::init_tracing(args.log_json);

    let atlas_config = load_config(args.config.as_ref())?;
    info!(
        deletion_scope = ?atlas_config.state.deletion_scope,
        group_ids = ?atlas_config.state.group_ids,
        "Cluster Atlas starting"
    );
    config::init(atlas_config);
    let config = config::get();

    let connections = config.server.load_connections()?;
    let capabilities = Capabilities::from_config(&config.enrichment)
        .context("Failed to build enrichment capabilities")?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    supervisor::cancel_on_ctrl_c(cancel_token.clone());

    let mut source = StdinSource::stdin();
    let mut sessions = 0u32;
    loop {
        sessions += 1;
        info!(session = sessions, "Opening session");
        match run_session(&args, &mut source, &capabilities, connections.clone(), cancel_token.clone()).await {
            Ok(SessionEnd::Restart(label)) => {
                info!(workload = %label, "Starting a fresh session");
            }
            Ok(SessionEnd::Shutdown) => break,
            Err(e) => {
                error!("Session failed: {:#}", e);
                return Err(e);
            }
        }
        if cancel_token.is_cancelled() {
            break;
        }
    }

    info!("Cluster Atlas shutdown complete");
    Ok(())
}
