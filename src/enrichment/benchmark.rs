//! CPU and network benchmarks.

use async_trait::async_trait;
use rand::Rng;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{http_client, Benchmark, EnrichmentError};
use crate::config::EnrichmentConfig;
use crate::types::BenchmarkKind;

/// Iterations between deadline checks.
const BATCH: u64 = 10_000;

// ============================================================================
// CPU
// ============================================================================

/// Bounded busy work on every rayon worker. Score is operations per
/// millisecond across all workers.
#[derive(Debug, Clone)]
pub struct CpuBenchmark {
    duration: Duration,
}

impl CpuBenchmark {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(Duration::from_millis(config.cpu_benchmark_ms))
    }
}

fn measure_cpu(duration: Duration) -> f64 {
    let started = Instant::now();
    let deadline = started + duration;

    let operations: u64 = (0..rayon::current_num_threads())
        .into_par_iter()
        .map(|worker| {
            let mut state = worker as u64 + 1;
            let mut operations = 0u64;
            loop {
                for _ in 0..BATCH {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                }
                operations += BATCH;
                if Instant::now() >= deadline {
                    break;
                }
            }
            std::hint::black_box(state);
            operations
        })
        .sum();

    let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
    operations as f64 / elapsed_ms.max(1.0)
}

#[async_trait]
impl Benchmark for CpuBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Cpu
    }

    async fn run(&self) -> Result<f64, EnrichmentError> {
        let duration = self.duration;
        let score = tokio::task::spawn_blocking(move || measure_cpu(duration)).await?;
        debug!(score, "CPU benchmark finished");
        Ok(score)
    }
}

// ============================================================================
// Network
// ============================================================================

/// Uploads a random payload and reports the throughput in Mbit/s.
#[derive(Debug, Clone)]
pub struct HttpNetBenchmark {
    http: reqwest::Client,
    url: Option<String>,
    payload_bytes: usize,
}

impl HttpNetBenchmark {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Ok(Self {
            http: http_client(config.http_timeout_secs)?,
            url: config.net_benchmark_url.clone(),
            payload_bytes: config.net_payload_bytes,
        })
    }
}

#[async_trait]
impl Benchmark for HttpNetBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Net
    }

    async fn run(&self) -> Result<f64, EnrichmentError> {
        let url = self
            .url
            .as_deref()
            .ok_or(EnrichmentError::NotConfigured("enrichment.net_benchmark_url"))?;

        let mut payload = vec![0u8; self.payload_bytes];
        rand::thread_rng().fill(&mut payload[..]);

        let started = Instant::now();
        let resp = self.http.post(url).body(payload).send().await?;
        if !resp.status().is_success() {
            return Err(EnrichmentError::ServerError(resp.status()));
        }
        // wait for the full exchange
        resp.bytes().await?;

        let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
        let mbits = (self.payload_bytes as f64 * 8.0) / 1_000_000.0;
        let score = mbits / secs;
        debug!(score, bytes = self.payload_bytes, "Network benchmark finished");
        Ok(score)
    }
}

// ============================================================================
// Fixed
// ============================================================================

/// Reports the same score every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedScore {
    kind: BenchmarkKind,
    score: f64,
}

impl FixedScore {
    pub fn new(kind: BenchmarkKind, score: f64) -> Self {
        Self { kind, score }
    }
}

#[async_trait]
impl Benchmark for FixedScore {
    fn kind(&self) -> BenchmarkKind {
        self.kind
    }

    async fn run(&self) -> Result<f64, EnrichmentError> {
        Ok(self.score)
    }
}
