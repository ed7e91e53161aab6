//! Cluster Actor - single writer of the cluster state

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::snapshot::{stats_of, ClusterSnapshot, ClusterView, GraphDeriver, LocalView};
use super::RestartSignal;
use crate::config::defaults::ENGINE_QUEUE_CAPACITY;
use crate::config::StateConfig;
use crate::enrichment::{Geocoder, Place};
use crate::ingestion::ClusterEvent;
use crate::state::{ClusterState, Effect, GeocodeOutcome};
use crate::types::Connections;

// ============================================================================
// Commands
// ============================================================================

/// Updates to the local node's own view.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalUpdate {
    /// Runtime configuration about to be opened.
    Configured(String),
    Opened,
    Closed,
    PublicIp(String),
    /// A location lookup started.
    LocationLoading,
    /// A location lookup finished.
    Coordinates { latitude: f64, longitude: f64 },
    /// Location access was denied; falls back to `(0, 0)`.
    LocationDenied,
    /// Reverse lookup of the own coordinates; `None` clears address and flag.
    Place(Option<Place>),
}

/// Commands for ClusterActor
#[derive(Debug)]
pub enum ClusterCommand {
    /// Apply a runtime event
    Apply(ClusterEvent),
    /// Result of an off-loop reverse-geocode lookup
    LocationResolved {
        describes: String,
        latitude: f64,
        longitude: f64,
        outcome: GeocodeOutcome,
    },
    Local(LocalUpdate),
    /// Append a line to the event log
    Record(String),
    /// Reply once every previously queued command has been applied
    Flush(oneshot::Sender<()>),
}

// ============================================================================
// Actor Handle
// ============================================================================

/// Handle to interact with ClusterActor
#[derive(Clone)]
pub struct ClusterHandle {
    tx: mpsc::Sender<ClusterCommand>,
    snapshot: Arc<ArcSwap<ClusterSnapshot>>,
    refresh_rx: watch::Receiver<u64>,
}

impl ClusterHandle {
    async fn send(&self, command: ClusterCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .context("Cluster actor channel closed")
    }

    /// Queue a runtime event
    pub async fn dispatch(&self, event: ClusterEvent) -> Result<()> {
        self.send(ClusterCommand::Apply(event)).await
    }

    pub async fn update_local(&self, update: LocalUpdate) -> Result<()> {
        self.send(ClusterCommand::Local(update)).await
    }

    /// Append a free-form line to the event log
    pub async fn record(&self, message: impl Into<String>) -> Result<()> {
        self.send(ClusterCommand::Record(message.into())).await
    }

    /// Wait until every command queued before this call has been applied
    /// and published.
    pub async fn flush(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ClusterCommand::Flush(response_tx)).await?;
        response_rx.await.context("Response channel closed")
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.snapshot.load_full()
    }

    pub fn local_id(&self) -> Option<String> {
        self.snapshot.load().local.node_id.clone()
    }

    pub fn peers(&self) -> Vec<String> {
        self.snapshot.load().peers()
    }

    /// Counter bumped whenever enrichment producers should run again.
    pub fn subscribe_refresh(&self) -> watch::Receiver<u64> {
        self.refresh_rx.clone()
    }

    /// Poll published snapshots until `predicate` holds or `timeout` passes.
    pub async fn wait_until<F>(&self, timeout: Duration, predicate: F) -> Option<Arc<ClusterSnapshot>>
    where
        F: Fn(&ClusterSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.snapshot();
            if predicate(&snapshot) {
                return Some(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

// ============================================================================
// Cluster Actor
// ============================================================================

/// Owns the [`ClusterState`]; applies one command at a time and republishes
/// the snapshot after each.
pub struct ClusterActor {
    state: ClusterState,
    local: LocalView,
    connections: Option<Connections>,
    graphs: GraphDeriver,
    geocoder: Arc<dyn Geocoder>,
    rx: mpsc::Receiver<ClusterCommand>,
    /// Weak so pending lookups do not keep the actor alive
    feedback: mpsc::WeakSender<ClusterCommand>,
    snapshot: Arc<ArcSwap<ClusterSnapshot>>,
    refresh_tx: watch::Sender<u64>,
    restart_tx: mpsc::UnboundedSender<RestartSignal>,
    /// Refresh requested by the current command, signalled after publishing
    refresh_pending: bool,
    version: u64,
}

impl ClusterActor {
    /// Create new cluster actor, its handle and the restart receiver
    pub fn new(
        policy: StateConfig,
        connections: Option<Connections>,
        geocoder: Arc<dyn Geocoder>,
    ) -> (Self, ClusterHandle, mpsc::UnboundedReceiver<RestartSignal>) {
        let (tx, rx) = mpsc::channel(ENGINE_QUEUE_CAPACITY);
        let (refresh_tx, refresh_rx) = watch::channel(0u64);
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();

        let graphs = GraphDeriver::new(policy.group_ids);
        let snapshot = Arc::new(ArcSwap::from_pointee(ClusterSnapshot {
            cluster: ClusterView {
                connections: connections.clone(),
                ..ClusterView::default()
            },
            ..ClusterSnapshot::default()
        }));

        let actor = Self {
            state: ClusterState::new(policy),
            local: LocalView::default(),
            connections,
            graphs,
            geocoder,
            rx,
            feedback: tx.downgrade(),
            snapshot: Arc::clone(&snapshot),
            refresh_tx,
            restart_tx,
            refresh_pending: false,
            version: 0,
        };

        let handle = ClusterHandle {
            tx,
            snapshot,
            refresh_rx,
        };

        (actor, handle, restart_rx)
    }

    /// Create the actor and run it on its own task.
    pub fn spawn(
        policy: StateConfig,
        connections: Option<Connections>,
        geocoder: Arc<dyn Geocoder>,
    ) -> (ClusterHandle, mpsc::UnboundedReceiver<RestartSignal>) {
        let (actor, handle, restart_rx) = Self::new(policy, connections, geocoder);
        tokio::spawn(actor.run());
        (handle, restart_rx)
    }

    /// Run the actor loop until every handle is dropped
    pub async fn run(mut self) {
        info!("ClusterActor starting");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                ClusterCommand::Apply(event) => {
                    let effects = self.state.apply(event);
                    for effect in effects {
                        self.perform(effect);
                    }
                    self.publish();
                }
                ClusterCommand::LocationResolved {
                    describes,
                    latitude,
                    longitude,
                    outcome,
                } => {
                    if self.state.apply_location(&describes, latitude, longitude, outcome) {
                        self.publish();
                    }
                }
                ClusterCommand::Local(update) => {
                    self.apply_local(update);
                    self.publish();
                }
                ClusterCommand::Record(message) => {
                    self.state.record(message);
                    self.publish();
                }
                ClusterCommand::Flush(response_tx) => {
                    let _ = response_tx.send(());
                }
            }
        }

        info!(version = self.version, "ClusterActor stopped");
    }

    fn apply_local(&mut self, update: LocalUpdate) {
        debug!(update = ?update, "Local view update");
        match update {
            LocalUpdate::Configured(config) => self.local.node_config = Some(config),
            LocalUpdate::Opened => {
                self.local.opened = true;
                self.refresh_pending = true;
            }
            LocalUpdate::Closed => self.local.opened = false,
            LocalUpdate::PublicIp(ip) => self.local.public_ip = Some(ip),
            LocalUpdate::LocationLoading => self.local.location.loading = true,
            LocalUpdate::Coordinates { latitude, longitude } => {
                let location = &mut self.local.location;
                location.latitude = latitude;
                location.longitude = longitude;
                location.loading = false;
            }
            LocalUpdate::LocationDenied => {
                let location = &mut self.local.location;
                location.latitude = 0.0;
                location.longitude = 0.0;
                location.loading = false;
            }
            LocalUpdate::Place(place) => {
                let location = &mut self.local.location;
                location.flag = place.as_ref().and_then(Place::flag);
                location.address = place.map(|p| p.address);
            }
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Geocode {
                describes,
                latitude,
                longitude,
            } => self.spawn_geocode(describes, latitude, longitude),
            Effect::Restart { label } => {
                if self.restart_tx.send(RestartSignal { label }).is_err() {
                    warn!("Restart requested but nobody is listening");
                }
            }
            Effect::RefreshEnrichment => self.refresh_pending = true,
        }
    }

    /// Resolve coordinates off the loop; the outcome re-enters as a command.
    fn spawn_geocode(&self, describes: String, latitude: f64, longitude: f64) {
        let geocoder = Arc::clone(&self.geocoder);
        let feedback = self.feedback.clone();

        tokio::spawn(async move {
            let outcome = match geocoder.reverse(latitude, longitude).await {
                Ok(Some(place)) => GeocodeOutcome::Resolved(place.address),
                Ok(None) => GeocodeOutcome::Empty,
                Err(e) => GeocodeOutcome::Failed(e.to_string()),
            };
            let Some(tx) = feedback.upgrade() else {
                debug!(node = %describes, "Cluster actor gone, dropping location");
                return;
            };
            let _ = tx
                .send(ClusterCommand::LocationResolved {
                    describes,
                    latitude,
                    longitude,
                    outcome,
                })
                .await;
        });
    }

    fn publish(&mut self) {
        self.version += 1;
        let graphs = self.graphs.derive(&self.state);

        let mut local = self.local.clone();
        local.node_id = self.state.local_id().map(str::to_string);

        let snapshot = ClusterSnapshot {
            version: self.version,
            graphs,
            stats: stats_of(&self.state),
            cluster: ClusterView {
                connections: self.connections.clone(),
                nodes: self.state.nodes().to_vec(),
                resources: self.state.resources().to_vec(),
            },
            local,
            log: self.state.log().clone(),
        };
        self.snapshot.store(Arc::new(snapshot));

        // producers read the gate from the snapshot, so it must be stored first
        if std::mem::take(&mut self.refresh_pending) {
            self.refresh_tx.send_modify(|count| *count += 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{EnrichmentError, StaticGeocoder};
    use crate::types::{Resolvable, Resource};
    use async_trait::async_trait;

    fn spawn_with(geocoder: Arc<dyn Geocoder>) -> (ClusterHandle, mpsc::UnboundedReceiver<RestartSignal>) {
        ClusterActor::spawn(StateConfig::default(), None, geocoder)
    }

    #[tokio::test]
    async fn test_flush_is_a_barrier() {
        let (handle, _restart) = spawn_with(Arc::new(StaticGeocoder::empty()));
        handle
            .dispatch(ClusterEvent::NodeAcknowledged { id: "a".into() })
            .await
            .unwrap();
        handle.dispatch(ClusterEvent::NodeJoined { id: "b".into() }).await.unwrap();
        handle.flush().await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.peers(), vec!["a", "b"]);
        assert_eq!(handle.local_id().as_deref(), Some("a"));
        assert_eq!(snapshot.log.len(), 2);
        assert!(snapshot.graphs.local.is_some());
    }

    #[tokio::test]
    async fn test_joins_bump_refresh_counter() {
        let (handle, _restart) = spawn_with(Arc::new(StaticGeocoder::empty()));
        let refresh = handle.subscribe_refresh();
        handle.dispatch(ClusterEvent::NodeJoined { id: "b".into() }).await.unwrap();
        handle.dispatch(ClusterEvent::NodeLeft { id: "b".into() }).await.unwrap();
        handle.flush().await.unwrap();
        assert_eq!(*refresh.borrow(), 1);
    }

    #[tokio::test]
    async fn test_refresh_follows_published_snapshot() {
        let (handle, _restart) = spawn_with(Arc::new(StaticGeocoder::empty()));
        let mut refresh = handle.subscribe_refresh();
        handle
            .dispatch(ClusterEvent::NodeAcknowledged { id: "a".into() })
            .await
            .unwrap();
        handle.update_local(LocalUpdate::Opened).await.unwrap();

        refresh.changed().await.unwrap();
        while *refresh.borrow_and_update() < 2 {
            refresh.changed().await.unwrap();
        }
        assert!(handle.snapshot().enrichment_ready());
    }

    #[tokio::test]
    async fn test_workload_deletion_signals_restart() {
        let (handle, mut restart) = spawn_with(Arc::new(StaticGeocoder::empty()));
        let workload = Resource::new(crate::types::ResourceKind::Workload, "w", "w1", serde_json::json!({}));
        handle
            .dispatch(ClusterEvent::NodeAcknowledged { id: "a".into() })
            .await
            .unwrap();
        handle
            .dispatch(ClusterEvent::ResourceCreated {
                node_id: "a".into(),
                resource: workload.clone(),
            })
            .await
            .unwrap();
        handle
            .dispatch(ClusterEvent::ResourceDeleted {
                node_id: "a".into(),
                resource: workload,
            })
            .await
            .unwrap();
        handle.flush().await.unwrap();

        assert_eq!(restart.try_recv().unwrap().label, "w1");
        assert!(restart.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_coordinates_resolve_to_location() {
        let (handle, _restart) = spawn_with(Arc::new(StaticGeocoder::new("Berlin, Mitte, Berlin, 10117, Deutschland")));
        handle
            .dispatch(ClusterEvent::NodeAcknowledged { id: "a".into() })
            .await
            .unwrap();
        handle
            .dispatch(ClusterEvent::ResourceCreated {
                node_id: "a".into(),
                resource: Resource::coordinates("a", 52.52, 13.40),
            })
            .await
            .unwrap();

        let snapshot = handle
            .wait_until(Duration::from_secs(2), |s| {
                s.node("a").is_some_and(|n| n.location != Resolvable::Loading)
            })
            .await
            .expect("location resolved");
        let node = snapshot.node("a").unwrap();
        assert_eq!(node.location, Resolvable::Known("Berlin, Mitte, Berlin, 10117".into()));
        assert_eq!((node.latitude, node.longitude), (52.52, 13.40));
    }

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Option<Place>, EnrichmentError> {
            Err(EnrichmentError::Unavailable("geocoder offline".into()))
        }
    }

    #[tokio::test]
    async fn test_failed_geocode_leaves_node_unchanged() {
        let (handle, _restart) = spawn_with(Arc::new(FailingGeocoder));
        handle
            .dispatch(ClusterEvent::NodeAcknowledged { id: "a".into() })
            .await
            .unwrap();
        handle
            .dispatch(ClusterEvent::ResourceCreated {
                node_id: "a".into(),
                resource: Resource::coordinates("a", 52.52, 13.40),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.flush().await.unwrap();

        let node = handle.snapshot().node("a").cloned().unwrap();
        assert_eq!(node.location, Resolvable::Loading);
        assert_eq!((node.latitude, node.longitude), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_local_view_updates() {
        let (handle, _restart) = spawn_with(Arc::new(StaticGeocoder::empty()));
        let refresh = handle.subscribe_refresh();
        handle.update_local(LocalUpdate::Configured("{}".into())).await.unwrap();
        handle.update_local(LocalUpdate::Opened).await.unwrap();
        handle.update_local(LocalUpdate::LocationLoading).await.unwrap();
        handle.flush().await.unwrap();

        let snapshot = handle.snapshot();
        assert!(snapshot.local.opened);
        assert!(snapshot.local.location.loading);
        assert_eq!(snapshot.local.node_config.as_deref(), Some("{}"));
        assert!(!snapshot.enrichment_ready());
        assert_eq!(*refresh.borrow(), 1);

        handle
            .update_local(LocalUpdate::Coordinates {
                latitude: 52.5,
                longitude: 13.4,
            })
            .await
            .unwrap();
        handle
            .update_local(LocalUpdate::Place(Some(Place::new("Berlin").with_country("de"))))
            .await
            .unwrap();
        handle.flush().await.unwrap();
        let location = handle.snapshot().local.location.clone();
        assert!(!location.loading);
        assert_eq!((location.latitude, location.longitude), (52.5, 13.4));
        assert_eq!(location.address.as_deref(), Some("Berlin"));
        assert_eq!(location.flag.as_deref(), Some("🇩🇪"));

        handle.update_local(LocalUpdate::Place(None)).await.unwrap();
        handle.flush().await.unwrap();
        let location = handle.snapshot().local.location.clone();
        assert_eq!(location.address, None);
        assert_eq!(location.flag, None);
    }
}
