//! Event source abstraction.
//!
//! Runtimes that live outside this process hand their events over through an
//! [`EventSource`]: JSON lines on stdin, or an in-process channel.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ClusterEvent, EventAdapter};

/// Events produced by a source.
pub enum SourceEvent {
    Event(ClusterEvent),
    /// No more events will arrive.
    Eof,
}

#[async_trait]
pub trait EventSource: Send + 'static {
    /// Read the next event. `Err` means the source is unusable.
    async fn next_event(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Line Source (JSON events, one per line)
// ============================================================================

/// Reads one JSON-encoded [`ClusterEvent`] per line. Blank, non-UTF-8 and
/// malformed lines are skipped.
///
/// `next_event` is cancel safe: bytes of a partially read line stay in the
/// buffer until the line is complete.
pub struct LineSource<R> {
    reader: R,
    line_buffer: Vec<u8>,
    name: &'static str,
}

/// Line source reading the process's stdin.
pub type StdinSource = LineSource<BufReader<tokio::io::Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        LineSource::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, name: &'static str) -> Self {
        Self {
            reader,
            line_buffer: Vec::with_capacity(1024),
            name,
        }
    }
}

#[async_trait]
impl<R> EventSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_event(&mut self) -> Result<SourceEvent> {
        loop {
            let bytes = self.reader.read_until(b'\n', &mut self.line_buffer).await?;
            if bytes == 0 && self.line_buffer.is_empty() {
                return Ok(SourceEvent::Eof);
            }
            // a complete line, or the unterminated last one at EOF
            let parsed = parse_line(&self.line_buffer, self.name);
            self.line_buffer.clear();
            if let Some(event) = parsed {
                return Ok(SourceEvent::Event(event));
            }
        }
    }

    fn source_name(&self) -> &str {
        self.name
    }
}

fn parse_line(raw: &[u8], source: &str) -> Option<ClusterEvent> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => {
            warn!(source, error = %e, "Event line is not valid UTF-8, skipping");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<ClusterEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(source, error = %e, "Failed to parse event line, skipping");
            None
        }
    }
}

// ============================================================================
// Channel Source
// ============================================================================

/// Events pushed from elsewhere in the process.
pub struct ChannelSource {
    rx: mpsc::Receiver<ClusterEvent>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<ClusterEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        Ok(match self.rx.recv().await {
            Some(event) => SourceEvent::Event(event),
            None => SourceEvent::Eof,
        })
    }

    fn source_name(&self) -> &str {
        "channel"
    }
}

// ============================================================================
// Pump
// ============================================================================

/// Feed events from `source` into `adapter` until EOF, a source error or
/// cancellation. Returns the number of events delivered.
pub async fn pump<S: EventSource>(
    source: &mut S,
    adapter: &EventAdapter,
    cancel_token: CancellationToken,
) -> u64 {
    let mut delivered = 0u64;
    info!(source = source.source_name(), "Ingesting runtime events");

    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("[Ingestion] Shutdown signal received");
                break;
            }
            result = source.next_event() => match result {
                Ok(SourceEvent::Event(event)) => event,
                Ok(SourceEvent::Eof) => {
                    info!(source = source.source_name(), delivered, "Event source exhausted");
                    break;
                }
                Err(e) => {
                    warn!(source = source.source_name(), error = %e, "Event source error");
                    break;
                }
            }
        };

        adapter.deliver(event).await;
        delivered += 1;
    }

    delivered
}
