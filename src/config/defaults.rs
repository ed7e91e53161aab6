//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Resources & Roster
// ============================================================================

/// `apiVersion` stamped on resources produced by this process.
pub const API_VERSION: &str = "atlas.cluster/v1alpha1";

/// Rendering weight assigned to every node on insertion.
pub const DEFAULT_NODE_WEIGHT: u64 = 10_000_000;

/// Number of comma-separated address components kept from a geocoder answer.
pub const LOCATION_COMPONENTS: usize = 4;

// ============================================================================
// Engine
// ============================================================================

/// Capacity of the engine command queue.
pub const ENGINE_QUEUE_CAPACITY: usize = 1_024;

// ============================================================================
// Enrichment
// ============================================================================

/// Wall-clock budget of the CPU benchmark (milliseconds).
pub const CPU_BENCHMARK_DURATION_MS: u64 = 1_000;

/// Payload size transferred by the network benchmark (bytes).
pub const NET_BENCHMARK_PAYLOAD_BYTES: usize = 100_000;

/// Plain-text echo service used to discover the public address.
pub const PUBLIC_IP_URL: &str = "https://api64.ipify.org";

/// Reverse geocoding service base URL.
pub const GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// HTTP client timeout for enrichment lookups (seconds).
pub const ENRICHMENT_HTTP_TIMEOUT_SECS: u64 = 30;

/// User agent sent with enrichment lookups.
pub const USER_AGENT: &str = concat!("cluster-atlas/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Server
// ============================================================================

/// Default bind address of the snapshot API.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Simulation
// ============================================================================

/// Number of peers started by the loopback simulation.
pub const SIMULATION_PEERS: usize = 3;
