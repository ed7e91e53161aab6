//! Address and location lookups.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, CoordinateSource, EnrichmentError, Geocoder, Place, PublicAddressResolver};
use crate::config::EnrichmentConfig;

// ============================================================================
// Public address
// ============================================================================

/// Plain-text IP echo service.
#[derive(Debug, Clone)]
pub struct HttpPublicAddress {
    http: reqwest::Client,
    url: String,
}

impl HttpPublicAddress {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            url: config.public_ip_url.clone(),
        })
    }
}

#[async_trait]
impl PublicAddressResolver for HttpPublicAddress {
    async fn public_address(&self) -> Result<String, EnrichmentError> {
        let resp = self.http.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(EnrichmentError::ServerError(resp.status()));
        }
        let body = resp.text().await?;
        let ip = body.trim();
        if ip.is_empty() {
            return Err(EnrichmentError::Decode("empty address".to_string()));
        }
        Ok(ip.to_string())
    }
}

/// Always answers with the same address.
#[derive(Debug, Clone)]
pub struct StaticAddress(pub String);

#[async_trait]
impl PublicAddressResolver for StaticAddress {
    async fn public_address(&self) -> Result<String, EnrichmentError> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Reverse geocoding
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<ReverseAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    #[serde(default)]
    country_code: Option<String>,
}

impl ReverseResponse {
    fn into_place(self) -> Option<Place> {
        let address = self.display_name.filter(|name| !name.trim().is_empty())?;
        Some(Place {
            address,
            country_code: self.address.and_then(|a| a.country_code),
        })
    }
}

/// Nominatim-compatible reverse geocoder.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            base_url: config.geocoder_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>, EnrichmentError> {
        let resp = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(EnrichmentError::ServerError(resp.status()));
        }

        let body: ReverseResponse = resp.json().await?;
        if let Some(ref error) = body.error {
            debug!(latitude, longitude, error = %error, "Geocoder returned no match");
        }
        Ok(body.into_place())
    }
}

/// Answers every lookup with the same place, or with none.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    place: Option<Place>,
}

impl StaticGeocoder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            place: Some(Place::new(address)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, code: impl Into<String>) -> Self {
        self.place = self.place.map(|place| place.with_country(code));
        self
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Option<Place>, EnrichmentError> {
        Ok(self.place.clone())
    }
}

// ============================================================================
// Coordinates
// ============================================================================

/// Coordinates taken from configuration. Without configured coordinates the
/// lookup is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCoordinates {
    coordinates: Option<(f64, f64)>,
}

impl FixedCoordinates {
    pub fn new(coordinates: Option<(f64, f64)>) -> Self {
        Self { coordinates }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(config.coordinates())
    }
}

#[async_trait]
impl CoordinateSource for FixedCoordinates {
    async fn coordinates(&self) -> Result<(f64, f64), EnrichmentError> {
        self.coordinates.ok_or(EnrichmentError::Denied)
    }
}
