//! Unified line processing loop shared across all input modes.
//!
//! Owns the gate and the detector; decode → gate → detect runs sequentially
//! per line with no suspension points, so samples are applied in arrival
//! order. Results leave on an mpsc channel without blocking the sampling
//! path; connectivity changes are published on a watch channel for the UI
//! layer.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::gate::Gate;
use super::source::{LineSource, StreamEvent};
use crate::acquisition::{decode_line, Frame};
use crate::detector::CycleDetector;
use crate::types::{CycleResult, LinkStatus};

/// Counters accumulated over one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub lines_received: u64,
    pub status_frames: u64,
    pub height_samples: u64,
    pub samples_forwarded: u64,
    pub lines_ignored: u64,
    pub cycles_completed: u64,
    pub cycles_rejected: u64,
    pub results_dropped: u64,
}

/// Owns all state of the reader pipeline.
///
/// Built with [`new()`](ProcessingLoop::new), then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    gate: Gate,
    detector: CycleDetector,
    results_tx: mpsc::Sender<CycleResult>,
    status_tx: watch::Sender<LinkStatus>,
    cancel_token: CancellationToken,
    /// An outage at least this long clears any in-flight cycle on reconnect.
    prolonged_outage: Duration,
}

impl ProcessingLoop {
    pub fn new(
        gate: Gate,
        detector: CycleDetector,
        results_tx: mpsc::Sender<CycleResult>,
        status_tx: watch::Sender<LinkStatus>,
        cancel_token: CancellationToken,
        prolonged_outage: Duration,
    ) -> Self {
        Self {
            gate,
            detector,
            results_tx,
            status_tx,
            cancel_token,
            prolonged_outage,
        }
    }

    /// Run the pipeline until the source is exhausted or cancellation.
    ///
    /// Returns final statistics.
    pub async fn run<S: LineSource>(mut self, source: &mut S) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let mut disconnected_at: Option<Instant> = None;

        info!(source = source.source_name(), "Processing station stream");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[Pipeline] Shutdown signal received");
                    break;
                }
                result = source.next_event() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!("[Pipeline] Source error: {}", e);
                            break;
                        }
                    }
                }
            };

            match event {
                StreamEvent::Line(line) => {
                    stats.lines_received += 1;
                    self.handle_line(&line, &mut stats);
                }
                StreamEvent::Status(LinkStatus::Disconnected) => {
                    // Fail-safe: loss of communication means laser data is
                    // never forwarded until a fresh PLC frame arrives.
                    self.gate.mark_offline();
                    disconnected_at = Some(Instant::now());
                    let _ = self.status_tx.send(LinkStatus::Disconnected);
                    warn!("[Pipeline] Stream lost — gate offline");
                }
                StreamEvent::Status(LinkStatus::Connected) => {
                    if let Some(since) = disconnected_at.take() {
                        if since.elapsed() >= self.prolonged_outage {
                            // The cycle's remaining samples are gone for good.
                            self.detector.force_reset();
                        }
                    }
                    let _ = self.status_tx.send(LinkStatus::Connected);
                    info!("[Pipeline] Stream restored");
                }
                StreamEvent::Eof => {
                    info!(
                        "[Pipeline] Source reached end ({} lines processed)",
                        stats.lines_received
                    );
                    break;
                }
            }
        }

        stats.cycles_completed = self.detector.cycles_completed();
        stats.cycles_rejected = self.detector.cycles_rejected();

        info!("[Pipeline] Final statistics");
        info!(
            "   Lines: {} | PLC frames: {} | Samples: {} ({} forwarded)",
            stats.lines_received, stats.status_frames, stats.height_samples, stats.samples_forwarded
        );
        info!(
            "   Cycles: {} completed, {} rejected | Results dropped: {}",
            stats.cycles_completed, stats.cycles_rejected, stats.results_dropped
        );

        stats
    }

    /// Decode one line and run it through gate + detector.
    fn handle_line(&mut self, line: &str, stats: &mut PipelineStats) {
        match decode_line(line) {
            Some(Frame::Power(status)) => {
                stats.status_frames += 1;
                self.gate.on_status(status);
            }
            Some(Frame::Height(sample)) => {
                stats.height_samples += 1;
                let Some(sample) = self.gate.offer(sample) else {
                    return;
                };
                stats.samples_forwarded += 1;

                if let Some(result) = self.detector.push(sample.value) {
                    self.deliver(result, stats);
                }
            }
            None => {
                stats.lines_ignored += 1;
            }
        }
    }

    /// Hand a finished cycle to the sink without blocking the sampling
    /// path. Delivery failure is logged and the result dropped — the
    /// detector's post-finalize reset already happened and must stand.
    fn deliver(&self, result: CycleResult, stats: &mut PipelineStats) {
        if let Err(e) = self.results_tx.try_send(result) {
            stats.results_dropped += 1;
            warn!(error = %e, "Cycle result delivery failed — dropping");
        }
    }
}
