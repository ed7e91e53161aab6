//! Wiring of one observing node: engine, adapter, runtime, session and
//! enricher for a single session.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::StateConfig;
use crate::engine::{ClusterActor, ClusterHandle, RestartSignal, Session};
use crate::enrichment::{Capabilities, Enricher};
use crate::ingestion::{EventAdapter, LogRejections, RejectionHandler, RuntimeCallbacks};
use crate::runtime::ClusterRuntime;
use crate::types::Connections;

pub struct Node {
    pub session: Session,
    pub adapter: EventAdapter,
    pub enricher: Enricher,
    /// Fires when a workload deletion requires a fresh session.
    pub restarts: mpsc::UnboundedReceiver<RestartSignal>,
}

impl Node {
    /// Spawn a fresh engine and connect it to the runtime built by `runtime`,
    /// which receives the callbacks the runtime must deliver events to.
    pub fn assemble<F>(
        policy: StateConfig,
        connections: Option<Connections>,
        capabilities: Capabilities,
        runtime: F,
    ) -> Self
    where
        F: FnOnce(Arc<dyn RuntimeCallbacks>) -> Arc<dyn ClusterRuntime>,
    {
        Self::assemble_with_rejections(
            policy,
            connections,
            capabilities,
            Arc::new(LogRejections),
            runtime,
        )
    }

    /// Like [`Node::assemble`], with rejection frames from the runtime handed
    /// to `rejections` instead of only being logged.
    pub fn assemble_with_rejections<F>(
        policy: StateConfig,
        connections: Option<Connections>,
        capabilities: Capabilities,
        rejections: Arc<dyn RejectionHandler>,
        runtime: F,
    ) -> Self
    where
        F: FnOnce(Arc<dyn RuntimeCallbacks>) -> Arc<dyn ClusterRuntime>,
    {
        let (cluster, restarts) =
            ClusterActor::spawn(policy, connections, Arc::clone(&capabilities.geocoder));
        let adapter = EventAdapter::new(cluster.clone()).with_rejection_handler(rejections);
        let callbacks: Arc<dyn RuntimeCallbacks> = Arc::new(adapter.clone());
        let runtime = runtime(callbacks);
        let session = Session::new(cluster, runtime);
        let enricher = Enricher::new(session.clone(), capabilities);

        Self {
            session,
            adapter,
            enricher,
            restarts,
        }
    }

    pub fn cluster(&self) -> &ClusterHandle {
        self.session.cluster()
    }
}
