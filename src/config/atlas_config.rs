//! Atlas configuration loaded from TOML.
//!
//! Every section and field has a default, so an empty file (or no file) is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::Connections;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ATLAS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "atlas_config.toml";

/// Top-level configuration.
///
/// Loading order:
/// 1. `$ATLAS_CONFIG` env var
/// 2. `./atlas_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl AtlasConfig {
    /// Load configuration using the standard search order, falling back to
    /// defaults when nothing usable is found.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded atlas config from {}", CONFIG_ENV);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded atlas config");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No atlas config found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Ok(config)
    }

    /// Return every validation problem; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let e = &self.enrichment;

        if e.cpu_benchmark_ms == 0 {
            errors.push("enrichment.cpu_benchmark_ms must be > 0".to_string());
        }
        if e.net_payload_bytes == 0 {
            errors.push("enrichment.net_payload_bytes must be > 0".to_string());
        }
        if e.http_timeout_secs == 0 {
            errors.push("enrichment.http_timeout_secs must be > 0".to_string());
        }
        if let Some(lat) = e.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                errors.push(format!("enrichment.latitude {lat} outside [-90, 90]"));
            }
        }
        if let Some(lon) = e.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                errors.push(format!("enrichment.longitude {lon} outside [-180, 180]"));
            }
        }
        if e.latitude.is_some() != e.longitude.is_some() {
            errors.push("enrichment.latitude and enrichment.longitude must be set together".to_string());
        }
        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }

        errors
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
    Connections(PathBuf, serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Connections(path, e) => {
                write!(f, "Connections file error ({}): {}", path.display(), e)
            }
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// State Policies
// ============================================================================

/// How a resource deletion is matched against the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionScope {
    /// Match on `(owner_node, kind, label)`.
    ///
    /// Created resources are attributed to the observer's own node id, while
    /// a deletion matches on the node id of the deleting event. A deletion
    /// sent by any other peer therefore removes nothing here, but a workload
    /// deletion still triggers the restart.
    #[default]
    Owner,
    /// Match on `(kind, label)` across every owner.
    Cluster,
}

/// How resource kinds are mapped to graph groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupIdPolicy {
    /// Fresh first-seen numbering on every construction pass.
    #[default]
    PerPass,
    /// One persistent kind -> group registry for the whole session.
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub deletion_scope: DeletionScope,

    /// Drop benchmark scores of a node when it leaves.
    #[serde(default)]
    pub prune_scores_on_leave: bool,

    #[serde(default)]
    pub group_ids: GroupIdPolicy,

    #[serde(default = "default_node_weight")]
    pub node_weight: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            deletion_scope: DeletionScope::default(),
            prune_scores_on_leave: false,
            group_ids: GroupIdPolicy::default(),
            node_weight: default_node_weight(),
        }
    }
}

fn default_node_weight() -> u64 {
    defaults::DEFAULT_NODE_WEIGHT
}

// ============================================================================
// Enrichment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_cpu_benchmark_ms")]
    pub cpu_benchmark_ms: u64,

    #[serde(default = "default_net_payload_bytes")]
    pub net_payload_bytes: usize,

    /// Upload target of the network benchmark. The benchmark reports an
    /// error when unset.
    #[serde(default)]
    pub net_benchmark_url: Option<String>,

    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,

    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Device coordinates of this node, if known.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cpu_benchmark_ms: default_cpu_benchmark_ms(),
            net_payload_bytes: default_net_payload_bytes(),
            net_benchmark_url: None,
            public_ip_url: default_public_ip_url(),
            geocoder_url: default_geocoder_url(),
            http_timeout_secs: default_http_timeout_secs(),
            latitude: None,
            longitude: None,
        }
    }
}

impl EnrichmentConfig {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

fn default_cpu_benchmark_ms() -> u64 {
    defaults::CPU_BENCHMARK_DURATION_MS
}
fn default_net_payload_bytes() -> usize {
    defaults::NET_BENCHMARK_PAYLOAD_BYTES
}
fn default_public_ip_url() -> String {
    defaults::PUBLIC_IP_URL.to_string()
}
fn default_geocoder_url() -> String {
    defaults::GEOCODER_URL.to_string()
}
fn default_http_timeout_secs() -> u64 {
    defaults::ENRICHMENT_HTTP_TIMEOUT_SECS
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// JSON file with static management/application connection matrices.
    #[serde(default)]
    pub connections_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            connections_file: None,
        }
    }
}

impl ServerConfig {
    /// Read the connection matrices named by `connections_file`, if any.
    pub fn load_connections(&self) -> Result<Option<Connections>, ConfigError> {
        let Some(path) = &self.connections_file else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        let connections = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Connections(path.clone(), e))?;
        info!(path = %path.display(), "Loaded cluster connections");
        Ok(Some(connections))
    }
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}
