//! Event Ingestion
//!
//! Turns runtime callbacks (or serialized events from an external runtime)
//! into [`ClusterEvent`]s and funnels them into the single engine queue.
//!
//! ```text
//! runtime ──callbacks──▶ EventAdapter ──dispatch──▶ engine queue
//! stdin   ──LineSource──▶ pump() ──deliver──┘
//! ```

mod adapter;
mod event;
pub mod source;

pub use adapter::{EventAdapter, LogRejections, RejectionHandler, RuntimeCallbacks};
pub use event::ClusterEvent;
pub use source::{pump, ChannelSource, EventSource, LineSource, SourceEvent, StdinSource};
