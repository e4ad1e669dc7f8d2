//! Line source abstraction for the shared station stream.
//!
//! Provides a unified trait for reading raw lines from different sources:
//! the serial-over-TCP bridge, stdin (piped simulator), and scripted
//! replays (tests/demos). Connectivity changes travel through the same
//! seam so the processing loop can apply its fail-safe gating.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::acquisition::LineClient;
use crate::types::LinkStatus;

/// Events produced by a line source.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A newline-stripped line was read.
    Line(String),
    /// The link went down or came back.
    Status(LinkStatus),
    /// Source reached end of data (EOF for stdin/replay).
    Eof,
}

/// Trait abstracting where stream lines come from.
///
/// Implementations handle reconnection and pacing internally. The
/// processing loop calls [`next_event`](LineSource::next_event) in a
/// select! with cancellation.
#[async_trait]
pub trait LineSource: Send + 'static {
    /// Read the next event from the source.
    async fn next_event(&mut self) -> Result<StreamEvent>;

    /// Human-readable name for logging (e.g. "TCP", "stdin", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// TCP Source (serial-over-TCP bridge)
// ============================================================================

enum LinkPhase {
    Up,
    Down,
}

/// Reads lines from the station bridge via [`LineClient`].
///
/// Any read failure (close, I/O error, liveness timeout) yields
/// `Status(Disconnected)`; the following call reconnects — for as long as
/// it takes — and yields `Status(Connected)`.
pub struct TcpLineSource {
    client: LineClient,
    phase: LinkPhase,
}

impl TcpLineSource {
    /// Connect to the bridge and return a ready source.
    pub async fn connect(mut client: LineClient) -> Result<Self> {
        client.connect().await.map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(Self {
            client,
            phase: LinkPhase::Up,
        })
    }

    pub fn stats(&self) -> crate::acquisition::line_client::LinkStats {
        self.client.stats()
    }
}

#[async_trait]
impl LineSource for TcpLineSource {
    async fn next_event(&mut self) -> Result<StreamEvent> {
        match self.phase {
            LinkPhase::Down => {
                // Retries until the link is back; cancellation is the
                // processing loop's select!.
                self.client
                    .reconnect()
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                self.phase = LinkPhase::Up;
                Ok(StreamEvent::Status(LinkStatus::Connected))
            }
            LinkPhase::Up => match self.client.read_line().await {
                Ok(line) => Ok(StreamEvent::Line(line)),
                // Close, I/O failure, or staleness all mean the same thing:
                // the stream is gone until a reconnect succeeds.
                Err(e) => {
                    warn!(error = %e, "Station stream lost");
                    self.phase = LinkPhase::Down;
                    Ok(StreamEvent::Status(LinkStatus::Disconnected))
                }
            },
        }
    }

    fn source_name(&self) -> &str {
        "TCP"
    }
}

// ============================================================================
// Stdin Source (piped simulator)
// ============================================================================

/// Reads stream lines from stdin, one frame per line.
///
/// Used with the simulator: `simulate | weldwatch --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(128),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinSource {
    async fn next_event(&mut self) -> Result<StreamEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(StreamEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(StreamEvent::Line(line.to_string()));
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Replay Source (scripted events)
// ============================================================================

/// Replays a pre-built event script with optional inter-event delay.
pub struct ReplaySource {
    events: std::vec::IntoIter<StreamEvent>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn from_events(events: Vec<StreamEvent>, delay_ms: u64) -> Self {
        Self {
            events: events.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    pub fn from_lines<I, S>(lines: I, delay_ms: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events = lines
            .into_iter()
            .map(|l| StreamEvent::Line(l.into()))
            .collect();
        Self::from_events(events, delay_ms)
    }
}

#[async_trait]
impl LineSource for ReplaySource {
    async fn next_event(&mut self) -> Result<StreamEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.events.next() {
            Some(ev) => {
                self.yielded_first = true;
                Ok(ev)
            }
            None => Ok(StreamEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}
