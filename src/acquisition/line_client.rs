//! TCP line client for the station's serial-over-TCP bridge
//!
//! The PLC and laser share one serial line; deployments expose it through a
//! serial-over-TCP bridge. This client owns the socket, reads CR/LF
//! terminated lines, and treats silence as loss: if no byte arrives within
//! the liveness window the stream is declared stale and must be reconnected.
//!
//! Reconnection uses a fixed delay (commissioning value 1.5 s) and retries
//! until the link is back — giving up is not an option on a production
//! station. Cancellation is handled by the caller's select! loop.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Link errors surfaced to the source layer.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Stream stale — no data within liveness window")]
    Stale,

    #[error("Connection closed")]
    Closed,
}

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Line client with liveness detection and fixed-delay reconnect.
pub struct LineClient {
    host: String,
    port: u16,
    stream: Option<BufReader<TcpStream>>,
    line_buffer: String,
    /// No data within this window means the stream is lost.
    liveness_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    reconnect_delay: Duration,
    /// Total lines received since creation.
    lines_received: u64,
    /// Total reconnections performed.
    reconnections: u64,
    /// Total liveness timeouts encountered.
    timeouts: u64,
}

impl LineClient {
    pub fn new(
        host: &str,
        port: u16,
        liveness_timeout: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
            line_buffer: String::with_capacity(128),
            liveness_timeout,
            reconnect_delay,
            lines_received: 0,
            reconnections: 0,
            timeouts: 0,
        }
    }

    /// Connect to the bridge with timeout and TCP keepalive.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.host, self.port);
        info!(address = %addr, "Connecting to station stream");

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| LinkError::ConnectionFailed("connect timeout".to_string()))?
            .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;

        // TCP keepalive to detect dead bridges faster than the OS default
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        self.stream = Some(BufReader::new(stream));
        info!("Station stream connected");
        Ok(())
    }

    /// Drop the current connection.
    pub async fn disconnect(&mut self) {
        if let Some(ref mut reader) = self.stream {
            let _ = reader.get_mut().shutdown().await;
        }
        self.stream = None;
    }

    /// Reconnect with a fixed delay between attempts, retrying until the
    /// link is back. The caller's select! provides cancellation.
    pub async fn reconnect(&mut self) -> Result<(), LinkError> {
        self.disconnect().await;

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            tokio::time::sleep(self.reconnect_delay).await;

            match self.connect().await {
                Ok(()) => {
                    self.reconnections += 1;
                    info!(
                        attempt = attempt,
                        total_reconnections = self.reconnections,
                        "Station stream reconnected"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Reconnect attempt failed");
                }
            }
        }
    }

    /// Read the next newline-stripped line.
    ///
    /// Errors mean the connection is gone (closed, I/O failure, or stale
    /// per the liveness window) — the caller decides when to reconnect.
    pub async fn read_line(&mut self) -> Result<String, LinkError> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| LinkError::ConnectionFailed("not connected".to_string()))?;

        loop {
            self.line_buffer.clear();

            let read_result =
                tokio::time::timeout(self.liveness_timeout, reader.read_line(&mut self.line_buffer))
                    .await;

            let bytes = match read_result {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => return Err(LinkError::ConnectionFailed(e.to_string())),
                Err(_) => {
                    self.timeouts += 1;
                    warn!(
                        timeout_secs = self.liveness_timeout.as_secs_f64(),
                        total_timeouts = self.timeouts,
                        "Station stream stale — no data within liveness window"
                    );
                    return Err(LinkError::Stale);
                }
            };

            if bytes == 0 {
                return Err(LinkError::Closed);
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            self.lines_received += 1;
            return Ok(line.to_string());
        }
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Link health statistics.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            connected: self.stream.is_some(),
            lines_received: self.lines_received,
            reconnections: self.reconnections,
            timeouts: self.timeouts,
        }
    }
}

/// Link health statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkStats {
    pub connected: bool,
    pub lines_received: u64,
    pub reconnections: u64,
    pub timeouts: u64,
}
