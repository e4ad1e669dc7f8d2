//! Cycle Flow Regression Tests
//!
//! Exercises the full decode → gate → detect pipeline through
//! [`ProcessingLoop`] with scripted stream events. Asserts on gating,
//! cycle detection, rejection, and the transport-loss fail-safe.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use weldwatch::detector::CycleDetector;
use weldwatch::pipeline::{Gate, PipelineStats, ProcessingLoop, ReplaySource, StreamEvent};
use weldwatch::types::{ActiveModel, CycleResult, DetectorParams, LinkStatus, Verdict};

/// Small-signal tuning matching the scripted line values below.
fn test_params() -> DetectorParams {
    DetectorParams {
        threshold: 1.0,
        max_weld_slope: 0.45,
        max_plausible_weld_depth: 5.0,
        min_weld_samples: 3,
        reference_stable_slope: 0.4,
        reference_stable_count: 5,
    }
}

fn test_model() -> ActiveModel {
    ActiveModel {
        id: Some(7),
        name: "G510-A".to_string(),
        model_type: "LHD".to_string(),
        lower_limit: 0.2,
        upper_limit: 0.5,
    }
}

/// One full weld cycle on the wire: arm at 1.2, lock at 1.20, collapse to
/// 0.80, retract. Expected weld_depth = 0.40.
fn cycle_lines() -> Vec<StreamEvent> {
    [
        "L1.2", "L1.2", "L1.21", "L1.19", "L1.20", "L1.20", // lock at 1.20
        "L1.20", "L1.10", "L1.00", "L0.90", "L0.80", // collapse
        "L0.30", // retraction + finalize
    ]
    .iter()
    .map(|l| StreamEvent::Line((*l).to_string()))
    .collect()
}

fn line(s: &str) -> StreamEvent {
    StreamEvent::Line(s.to_string())
}

/// Run a scripted event sequence through the full pipeline.
async fn run_events(
    events: Vec<StreamEvent>,
    prolonged_outage: Duration,
) -> (Vec<CycleResult>, PipelineStats) {
    let model = Arc::new(ArcSwapOption::from_pointee(Some(test_model())));
    let gate = Gate::new("RUNNING");
    let detector = CycleDetector::new(test_params(), model);

    let (results_tx, mut results_rx) = mpsc::channel(16);
    let (status_tx, _status_rx) = watch::channel(LinkStatus::Disconnected);
    let cancel = CancellationToken::new();

    let pipeline = ProcessingLoop::new(
        gate,
        detector,
        results_tx,
        status_tx,
        cancel,
        prolonged_outage,
    );

    let mut source = ReplaySource::from_events(events, 0);
    let stats = pipeline.run(&mut source).await;

    let mut results = Vec::new();
    while let Ok(result) = results_rx.try_recv() {
        results.push(result);
    }
    (results, stats)
}

#[tokio::test]
async fn two_back_to_back_cycles_detected() {
    let mut events = vec![line("PLC:ON,RUNNING")];
    events.extend(cycle_lines());
    events.push(line("L0.0"));
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.weld_depth, 0.40);
        assert_eq!(result.reference_height, 1.20);
        assert_eq!(result.pass_fail, Verdict::Pass);
        assert_eq!(result.model_name, "G510-A");
    }
    assert_eq!(stats.cycles_completed, 2);
    assert_eq!(stats.status_frames, 1);
}

#[tokio::test]
async fn laser_suppressed_unless_powered_and_running() {
    // Full cycles arrive while the machine is off, then idle — none may
    // reach the detector.
    let mut events = vec![line("PLC:OFF,OFFLINE")];
    events.extend(cycle_lines());
    events.push(line("PLC:ON,IDLE"));
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert!(results.is_empty());
    assert_eq!(stats.samples_forwarded, 0);
    assert_eq!(stats.height_samples, 24);
    assert_eq!(stats.cycles_completed, 0);
}

#[tokio::test]
async fn no_forwarding_before_first_plc_frame() {
    // Startup order is not guaranteed on a shared stream: laser lines
    // before any PLC frame are dropped.
    let mut events = cycle_lines();
    events.push(line("PLC:ON,RUNNING"));
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(stats.samples_forwarded, 12);
}

#[tokio::test]
async fn disconnect_forces_gate_offline() {
    let mut events = vec![line("PLC:ON,RUNNING")];
    events.push(line("L0.0"));
    events.push(StreamEvent::Status(LinkStatus::Disconnected));
    events.push(StreamEvent::Status(LinkStatus::Connected));
    // The PLC may be mid-interval after reconnect: until its next frame
    // arrives, laser data must stay suppressed.
    events.extend(cycle_lines());
    events.push(line("PLC:ON,RUNNING"));
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert_eq!(results.len(), 1);
    // The pre-outage idle sample plus one full post-reconnect cycle.
    assert_eq!(stats.samples_forwarded, 13);
}

#[tokio::test]
async fn prolonged_outage_clears_in_flight_cycle() {
    let mut events = vec![line("PLC:ON,RUNNING")];
    // Arm and lock a reference at 3.0, then lose the stream mid-weld.
    // Without the reset, the stale 3.0 reference would bleed into the
    // post-outage samples and the cycle would be rejected.
    events.extend(
        ["L3.0", "L3.0", "L3.0", "L3.0", "L3.0", "L3.0", "L2.9"]
            .iter()
            .map(|l| line(l)),
    );
    events.push(StreamEvent::Status(LinkStatus::Disconnected));
    events.push(StreamEvent::Status(LinkStatus::Connected));
    events.push(line("PLC:ON,RUNNING"));
    // A fresh, complete cycle after the outage must be the only result.
    events.extend(cycle_lines());

    // Zero threshold: every outage counts as prolonged.
    let (results, _stats) = run_events(events, Duration::ZERO).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].weld_depth, 0.40);
    assert_eq!(results[0].reference_height, 1.20);
}

#[tokio::test]
async fn malformed_lines_are_dropped_not_fatal() {
    let mut events = vec![
        line("PLC:ON,RUNNING"),
        line("PLC:garbage"),
        line("Lnot-a-number"),
        line("0023.45"),
        line("PLC:ON"),
    ];
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(stats.lines_ignored, 4);
    assert_eq!(results[0].pass_fail, Verdict::Pass);
}

#[tokio::test]
async fn spurious_bump_rejected_without_result() {
    let mut events = vec![line("PLC:ON,RUNNING")];
    // Locks a reference but retracts after 2 weld samples (< 3 required).
    events.extend(
        ["L1.2", "L1.2", "L1.21", "L1.19", "L1.20", "L1.20", "L1.20", "L0.30"]
            .iter()
            .map(|l| line(l)),
    );
    // A genuine cycle afterwards still detects cleanly.
    events.extend(cycle_lines());

    let (results, stats) = run_events(events, Duration::from_secs(10)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(stats.cycles_rejected, 1);
    assert_eq!(stats.cycles_completed, 1);
}
