//! Wire-level resource declarations exchanged through the cluster runtime.
//!
//! Every resource has the shape `{ apiVersion, kind, metadata: { name, label }, spec }`.
//! The `spec` stays an untyped JSON value until a handler asks for the typed
//! view of one of the reserved kinds.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::defaults::API_VERSION;

// ============================================================================
// Resource Kind
// ============================================================================

/// Kind of a resource.
///
/// `Coordinates`, `BenchmarkScore` and `PublicIp` are reserved: they mutate
/// node and score state directly instead of becoming visible resources.
/// Kinds this crate does not know about are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceKind {
    Workload,
    Coordinates,
    BenchmarkScore,
    PublicIp,
    Other(String),
}

impl ResourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Workload => "Workload",
            Self::Coordinates => "Coordinates",
            Self::BenchmarkScore => "BenchmarkScore",
            Self::PublicIp => "PublicIP",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for ResourceKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "Workload" => Self::Workload,
            "Coordinates" => Self::Coordinates,
            "BenchmarkScore" => Self::BenchmarkScore,
            "PublicIP" => Self::PublicIp,
            _ => Self::Other(kind),
        }
    }
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        Self::from(kind.to_string())
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Benchmark Kind
// ============================================================================

/// Benchmark families carried by `BenchmarkScore` resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    Cpu,
    Net,
}

impl BenchmarkKind {
    /// Parse the raw `spec.kind` string. Unknown kinds return `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cpu" => Some(Self::Cpu),
            "net" => Some(Self::Net),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Net => "net",
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Resource metadata. `name` is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub label: String,
}

/// A typed, versioned declaration owned by one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Resource {
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        label: impl Into<String>,
        spec: serde_json::Value,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind,
            metadata: ResourceMetadata {
                name: Some(name.into()),
                label: label.into(),
            },
            spec,
        }
    }

    pub fn label(&self) -> &str {
        &self.metadata.label
    }

    /// Display name, falling back to the label.
    pub fn display_name(&self) -> &str {
        self.metadata
            .name
            .as_deref()
            .unwrap_or(&self.metadata.label)
    }

    /// Deserialize the spec into one of the typed views below.
    pub fn typed_spec<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.spec)
    }

    pub fn coordinates(describes: &str, latitude: f64, longitude: f64) -> Self {
        Self::new(
            ResourceKind::Coordinates,
            "Node Coordinates",
            "node_coordinates",
            serde_json::json!({
                "describes": describes,
                "latitude": latitude,
                "longitude": longitude,
            }),
        )
    }

    pub fn public_ip(describes: &str, public_ip: &str) -> Self {
        Self::new(
            ResourceKind::PublicIp,
            "Public IP",
            "public_ip",
            serde_json::json!({
                "describes": describes,
                "publicIP": public_ip,
            }),
        )
    }

    pub fn benchmark_score(describes: &str, kind: BenchmarkKind, score: f64) -> Self {
        let (name, label) = match kind {
            BenchmarkKind::Cpu => ("CPU Benchmark", "cpu_benchmark"),
            BenchmarkKind::Net => ("Network Benchmark", "net_benchmark"),
        };
        Self::new(
            ResourceKind::BenchmarkScore,
            name,
            label,
            serde_json::json!({
                "describes": describes,
                "kind": kind,
                "score": score,
            }),
        )
    }
}

// ============================================================================
// Typed specs of the reserved kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoordinatesSpec {
    pub describes: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublicIpSpec {
    pub describes: String,
    #[serde(rename = "publicIP")]
    pub public_ip: String,
}

/// `kind` stays a raw string so unknown benchmark families can be reported.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BenchmarkSpec {
    pub describes: String,
    pub kind: String,
    pub score: f64,
}
