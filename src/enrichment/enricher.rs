//! Enrichment producers.
//!
//! Each producer runs only once the local identity is known and the session
//! is open. Results are broadcast to every known peer as resources; failures
//! are logged, appended to the event log and leave prior state untouched.

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    Benchmark, CoordinateSource, CpuBenchmark, EnrichmentError, FixedCoordinates, Geocoder,
    HttpNetBenchmark, HttpPublicAddress, NominatimGeocoder, PublicAddressResolver,
};
use crate::config::EnrichmentConfig;
use crate::engine::{LocalUpdate, Session};
use crate::types::Resource;

/// The capability set the producers draw from.
#[derive(Clone)]
pub struct Capabilities {
    pub cpu: Arc<dyn Benchmark>,
    pub net: Arc<dyn Benchmark>,
    pub public_address: Arc<dyn PublicAddressResolver>,
    pub geocoder: Arc<dyn Geocoder>,
    pub coordinates: Arc<dyn CoordinateSource>,
}

impl Capabilities {
    /// HTTP and rayon backed capabilities.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Ok(Self {
            cpu: Arc::new(CpuBenchmark::from_config(config)),
            net: Arc::new(HttpNetBenchmark::new(config)?),
            public_address: Arc::new(HttpPublicAddress::new(config)?),
            geocoder: Arc::new(NominatimGeocoder::new(config)?),
            coordinates: Arc::new(FixedCoordinates::from_config(config)),
        })
    }
}

#[derive(Clone)]
pub struct Enricher {
    session: Session,
    capabilities: Capabilities,
}

impl Enricher {
    pub fn new(session: Session, capabilities: Capabilities) -> Self {
        Self {
            session,
            capabilities,
        }
    }

    /// Local id, when producers may run.
    fn gate(&self) -> Option<String> {
        let snapshot = self.session.cluster().snapshot();
        if snapshot.enrichment_ready() {
            snapshot.local.node_id.clone()
        } else {
            None
        }
    }

    /// Re-run the CPU, network and public-address producers whenever the
    /// engine signals a refresh.
    pub async fn run(self, cancel_token: CancellationToken) {
        let mut refresh = self.session.cluster().subscribe_refresh();
        info!("Enricher started");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[Enricher] Shutdown signal received");
                    break;
                }
                changed = refresh.changed() => {
                    if changed.is_err() {
                        debug!("Refresh channel closed");
                        break;
                    }
                    let round = *refresh.borrow_and_update();
                    if self.gate().is_none() {
                        debug!(round, "Enrichment gate closed, skipping refresh");
                        continue;
                    }
                    let enricher = self.clone();
                    tokio::spawn(async move { enricher.refresh_all().await });
                }
            }
        }
    }

    /// Run the refresh producers concurrently.
    pub async fn refresh_all(&self) {
        let (cpu, net, ip) = tokio::join!(
            self.publish_benchmark(self.capabilities.cpu.as_ref()),
            self.publish_benchmark(self.capabilities.net.as_ref()),
            self.publish_public_address(),
        );
        for result in [cpu, net, ip] {
            if let Err(e) = result {
                warn!(error = %e, "Enrichment producer failed");
            }
        }
    }

    /// Run one benchmark and broadcast its score. Returns whether a score
    /// was published.
    pub async fn publish_benchmark(&self, benchmark: &dyn Benchmark) -> Result<bool> {
        let Some(local_id) = self.gate() else {
            return Ok(false);
        };
        let kind = benchmark.kind();

        let score = match benchmark.run().await {
            Ok(score) => score,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Could not get benchmark");
                self.session
                    .cluster()
                    .record(format!("Could not get {kind} benchmark: {e}"))
                    .await?;
                return Ok(false);
            }
        };

        info!(kind = %kind, score, "Benchmark finished");
        self.broadcast(Resource::benchmark_score(&local_id, kind, score)).await;
        Ok(true)
    }

    /// Discover the public address, store it locally and broadcast it.
    pub async fn publish_public_address(&self) -> Result<bool> {
        let Some(local_id) = self.gate() else {
            return Ok(false);
        };

        let ip = match self.capabilities.public_address.public_address().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(error = %e, "Could not get public address");
                self.session
                    .cluster()
                    .record(format!("Could not get public address: {e}"))
                    .await?;
                return Ok(false);
            }
        };

        self.session
            .cluster()
            .update_local(LocalUpdate::PublicIp(ip.clone()))
            .await?;
        self.broadcast(Resource::public_ip(&local_id, &ip)).await;
        Ok(true)
    }

    /// Look up this node's coordinates, broadcast them and resolve the own
    /// address. Denied lookups fall back to `(0, 0)`.
    pub async fn refresh_location(&self) -> Result<bool> {
        let Some(local_id) = self.gate() else {
            return Ok(false);
        };
        let cluster = self.session.cluster();

        cluster.update_local(LocalUpdate::LocationLoading).await?;
        cluster.record("Requested location").await?;

        let (latitude, longitude) = match self.capabilities.coordinates.coordinates().await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                warn!(error = %e, "Could not get location, falling back to [0, 0]");
                cluster.update_local(LocalUpdate::LocationDenied).await?;
                cluster.record("Location access denied").await?;
                return Ok(false);
            }
        };

        cluster
            .update_local(LocalUpdate::Coordinates { latitude, longitude })
            .await?;
        cluster.record("Resolved location").await?;
        self.broadcast(Resource::coordinates(&local_id, latitude, longitude)).await;

        let place = match self.capabilities.geocoder.reverse(latitude, longitude).await {
            Ok(place) => place,
            Err(e) => {
                warn!(error = %e, "Could not resolve own address");
                None
            }
        };
        cluster.update_local(LocalUpdate::Place(place)).await?;
        Ok(true)
    }

    /// Send `resource` to every currently known peer. Returns the number of
    /// peers that accepted it.
    async fn broadcast(&self, resource: Resource) -> usize {
        let peers = self.session.cluster().peers();
        let sends = peers.iter().map(|peer| {
            let resource = resource.clone();
            async move {
                let result = self.session.create_resources(vec![resource], peer).await;
                (peer, result)
            }
        });

        let mut delivered = 0;
        for (peer, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(peer = %peer, error = %e, "Broadcast failed"),
            }
        }
        debug!(
            kind = %resource.kind,
            label = %resource.label(),
            delivered,
            peers = peers.len(),
            "Resource broadcast"
        );
        delivered
    }
}
