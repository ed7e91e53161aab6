//! Append-only, human-readable event trace.
//!
//! Lines are kept in fixed-size sealed chunks behind `Arc`s plus a short
//! open tail, so cloning the log for a snapshot copies at most one chunk.

use chrono::Local;
use serde::{Serialize, Serializer};
use std::sync::Arc;

const CHUNK_LINES: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    sealed: Vec<Arc<[String]>>,
    tail: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` prefixed with the local wall-clock time.
    pub fn append(&mut self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.tail.push(format!("{stamp}: {}", message.as_ref()));
        if self.tail.len() == CHUNK_LINES {
            let full = std::mem::replace(&mut self.tail, Vec::with_capacity(CHUNK_LINES));
            self.sealed.push(Arc::from(full));
        }
    }

    /// Lines in append order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.sealed
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.tail.iter())
            .map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.tail
            .last()
            .or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LINES + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for EventLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
