//! Enrichment Pipeline
//!
//! Derives facts about the local node (benchmark scores, public address,
//! coordinates) and publishes them back into the cluster as ordinary
//! resources. The capabilities behind each fact are traits so the service can
//! run against real HTTP endpoints while tests use fixed answers.
//!
//! | Capability | Default | Fixed |
//! |---|---|---|
//! | [`Benchmark`] | [`CpuBenchmark`], [`HttpNetBenchmark`] | [`FixedScore`] |
//! | [`PublicAddressResolver`] | [`HttpPublicAddress`] | [`StaticAddress`] |
//! | [`Geocoder`] | [`NominatimGeocoder`] | [`StaticGeocoder`] |
//! | [`CoordinateSource`] | [`FixedCoordinates`] | [`FixedCoordinates`] |

mod benchmark;
mod enricher;
mod lookup;

pub use benchmark::{CpuBenchmark, FixedScore, HttpNetBenchmark};
pub use enricher::{Capabilities, Enricher};
pub use lookup::{
    FixedCoordinates, HttpPublicAddress, NominatimGeocoder, StaticAddress, StaticGeocoder,
};

use async_trait::async_trait;
use std::time::Duration;

use crate::config::defaults::USER_AGENT;
use crate::types::BenchmarkKind;

/// Enrichment errors
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Location access denied")]
    Denied,
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Benchmark task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ============================================================================
// Capabilities
// ============================================================================

/// Produces a benchmark score for this node.
#[async_trait]
pub trait Benchmark: Send + Sync {
    fn kind(&self) -> BenchmarkKind;
    async fn run(&self) -> Result<f64, EnrichmentError>;
}

/// Discovers the public address of this node.
#[async_trait]
pub trait PublicAddressResolver: Send + Sync {
    async fn public_address(&self) -> Result<String, EnrichmentError>;
}

/// Result of a reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub address: String,
    /// ISO 3166-1 alpha-2 code, any case.
    pub country_code: Option<String>,
}

impl Place {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            country_code: None,
        }
    }

    pub fn with_country(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    /// Country flag emoji built from the regional indicator symbols of the
    /// country code. `None` unless the code is two ASCII letters.
    pub fn flag(&self) -> Option<String> {
        let code = self.country_code.as_deref()?.trim();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        code.bytes()
            .map(|b| char::from_u32(0x1F1E6 + u32::from(b.to_ascii_uppercase() - b'A')))
            .collect()
    }
}

/// Reverse geocoding. `Ok(None)` means the lookup succeeded without an
/// address.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>, EnrichmentError>;
}

/// Device coordinates of this node.
#[async_trait]
pub trait CoordinateSource: Send + Sync {
    async fn coordinates(&self) -> Result<(f64, f64), EnrichmentError>;
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EnrichmentError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}
