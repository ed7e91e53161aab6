//! Cluster Engine
//!
//! A single actor task owns the [`ClusterState`](crate::state::ClusterState)
//! and applies queued commands one at a time. After every command the graphs
//! are rebuilt and a fresh [`ClusterSnapshot`] is swapped in, so readers never
//! observe a half-applied event.
//!
//! ```text
//! EventAdapter ──┐
//! Enricher ──────┼──▶ mpsc ──▶ ClusterActor ──▶ ArcSwap<ClusterSnapshot>
//! geocode task ──┘                 │
//!                                  ├──▶ watch<u64>   (enrichment refresh)
//!                                  └──▶ RestartSignal (workload deleted)
//! ```

mod actor;
mod session;
mod snapshot;

pub use actor::{ClusterActor, ClusterCommand, ClusterHandle, LocalUpdate};
pub use session::Session;
pub use snapshot::{
    ClusterSnapshot, ClusterView, GraphDeriver, Graphs, LocalLocation, LocalView, Stats,
};

/// Raised when a workload was deleted; the owner must tear the session down
/// and start over with empty state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSignal {
    pub label: String,
}
