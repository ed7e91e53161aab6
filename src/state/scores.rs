//! Benchmark score tables and their summaries.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Median};
use std::collections::BTreeMap;

/// Latest score per node for one benchmark family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable {
    scores: BTreeMap<String, f64>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the score of `node`.
    pub fn upsert(&mut self, node: &str, score: f64) {
        self.scores.insert(node.to_string(), score);
    }

    pub fn remove(&mut self, node: &str) -> Option<f64> {
        self.scores.remove(node)
    }

    pub fn get(&self, node: &str) -> Option<f64> {
        self.scores.get(node).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.scores
    }

    /// Distribution summary over all finite scores; `None` when empty.
    pub fn summary(&self) -> Option<ScoreSummary> {
        let values: Vec<f64> = self.scores.values().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return None;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let count = values.len();
        let data = Data::new(values);

        Some(ScoreSummary {
            count,
            mean: data.mean().unwrap_or(0.0),
            median: data.median(),
            std_dev: data.std_dev().filter(|s| s.is_finite()),
            min,
            max,
        })
    }
}

/// Aggregate view of a score table for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; absent with fewer than two scores.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}
