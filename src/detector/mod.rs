//! Weld-cycle detector
//!
//! Consumes the gated, time-ordered height stream and turns the
//! rise–plateau–fall signature of one pneumatic weld cycle into a single
//! pass/fail measurement.
//!
//! Phases: IDLE (below threshold) → ARMED (in cycle, hunting a stable
//! reference) → WELDING (reference locked, tracking collapse depth) →
//! POST_WELD (retraction seen, waiting for the fall below threshold) →
//! finalize → IDLE.
//!
//! Slope is computed against the immediately previous raw sample — no
//! filtering, no timestamps. One call to [`push`](CycleDetector::push) is
//! exactly one sample, applied in arrival order.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tracing::{debug, info};

use crate::types::{
    ActiveModel, CycleResult, DetectorParams, Verdict, FALLBACK_LOWER_LIMIT, FALLBACK_UPPER_LIMIT,
};

/// Weld depth is reported to two decimals (hundredths of a millimeter).
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Runtime threshold update through a tuning handle.
///
/// A single pointer swap — safe to call from any thread while the pipeline
/// task is pushing samples. Takes effect on the next sample.
pub fn update_threshold(params: &ArcSwap<DetectorParams>, value: f64) {
    params.rcu(|p| {
        let mut next = (**p).clone();
        next.threshold = value;
        next
    });
    info!(threshold = value, "Detector threshold updated");
}

/// The cycle-detection state machine.
///
/// Exclusively owned by the reader pipeline; the only concurrent access is
/// through the atomic params/model handles, which are read here and swapped
/// elsewhere.
pub struct CycleDetector {
    params: Arc<ArcSwap<DetectorParams>>,
    model: Arc<ArcSwapOption<ActiveModel>>,

    in_cycle: bool,
    reference_locked: bool,
    in_welding: bool,
    reference_height: f64,
    min_height: f64,
    max_height: f64,
    /// Every sample of the cycle, from the arming sample onward.
    samples: Vec<f64>,
    /// Samples attributed to the welding phase (reference lock to retraction).
    weld_samples: Vec<f64>,
    prev_value: f64,
    stable_count: u32,

    cycles_completed: u64,
    cycles_rejected: u64,
}

impl CycleDetector {
    pub fn new(params: DetectorParams, model: Arc<ArcSwapOption<ActiveModel>>) -> Self {
        Self {
            params: Arc::new(ArcSwap::from_pointee(params)),
            model,
            in_cycle: false,
            reference_locked: false,
            in_welding: false,
            reference_height: 0.0,
            min_height: 0.0,
            max_height: 0.0,
            samples: Vec::new(),
            weld_samples: Vec::new(),
            prev_value: 0.0,
            stable_count: 0,
            cycles_completed: 0,
            cycles_rejected: 0,
        }
    }

    /// Handle for runtime tuning (threshold / full params) from other threads.
    pub fn params_handle(&self) -> Arc<ArcSwap<DetectorParams>> {
        Arc::clone(&self.params)
    }

    /// Replace all tuning parameters atomically.
    pub fn update_params(&self, params: DetectorParams) {
        self.params.store(Arc::new(params));
    }

    /// Feed one gated height sample. Returns a result only when this sample
    /// completes a valid cycle.
    pub fn push(&mut self, value: f64) -> Option<CycleResult> {
        let params = self.params.load_full();

        // Not in cycle: arm on threshold crossing, otherwise ignore.
        if !self.in_cycle {
            if value > params.threshold {
                self.arm(value);
            }
            return None;
        }

        self.samples.push(value);
        let slope = value - self.prev_value;
        self.prev_value = value;

        // Hunting the reference: count consecutive stable slopes. No
        // weld-depth tracking happens before the lock, even above threshold.
        if !self.reference_locked {
            if slope.abs() < params.reference_stable_slope {
                self.stable_count += 1;
                if self.stable_count >= params.reference_stable_count {
                    self.lock_reference(value);
                }
            } else {
                self.stable_count = 0;
            }
            return None;
        }

        if self.in_welding {
            let retracted = slope <= -params.max_weld_slope
                || value <= self.reference_height - params.max_plausible_weld_depth;
            if retracted {
                debug!(
                    value = value,
                    slope = slope,
                    reference = self.reference_height,
                    "Retraction detected — welding phase ended"
                );
                self.in_welding = false;
            } else {
                self.weld_samples.push(value);
                self.min_height = self.min_height.min(value);
                self.max_height = self.max_height.max(value);
            }
        }

        // End of cycle: welding over and the part fell back below threshold.
        if !self.in_welding && value <= params.threshold {
            return self.finalize(&params);
        }

        None
    }

    /// Clear any in-flight cycle without emitting a result.
    ///
    /// For the transport layer after a prolonged outage: the remaining
    /// samples of the cycle are gone, so the stalled state must not bleed
    /// into the next part.
    pub fn force_reset(&mut self) {
        if self.in_cycle {
            info!(
                samples = self.samples.len(),
                reference_locked = self.reference_locked,
                "Detector force-reset — in-flight cycle discarded"
            );
        }
        self.reset();
    }

    pub fn in_cycle(&self) -> bool {
        self.in_cycle
    }

    pub fn reference_locked(&self) -> bool {
        self.reference_locked
    }

    pub fn welding(&self) -> bool {
        self.in_welding
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn cycles_rejected(&self) -> u64 {
        self.cycles_rejected
    }

    fn arm(&mut self, value: f64) {
        self.reset();
        self.in_cycle = true;
        self.samples.push(value);
        self.prev_value = value;
        info!(value = value, "Cycle start");
    }

    fn lock_reference(&mut self, value: f64) {
        self.reference_height = value;
        self.reference_locked = true;
        self.in_welding = true;
        self.min_height = value;
        self.max_height = value;
        self.weld_samples.clear();
        self.weld_samples.push(value);
        info!(reference = value, "Reference locked — welding phase");
    }

    /// Close out the cycle: validate, measure, judge against the limits
    /// cached right now (not per-sample), and reset unconditionally.
    fn finalize(&mut self, params: &DetectorParams) -> Option<CycleResult> {
        if !self.reference_locked || self.weld_samples.len() < params.min_weld_samples {
            debug!(
                reference_locked = self.reference_locked,
                weld_samples = self.weld_samples.len(),
                min_required = params.min_weld_samples,
                "Cycle discarded (no weld signature)"
            );
            self.cycles_rejected += 1;
            self.reset();
            return None;
        }

        let weld_depth = round2(self.reference_height - self.min_height);

        let model = self.model.load_full();
        let (lower, upper) = model
            .as_deref()
            .map_or((FALLBACK_LOWER_LIMIT, FALLBACK_UPPER_LIMIT), |m| {
                (m.lower_limit, m.upper_limit)
            });
        let pass_fail = if lower <= weld_depth && weld_depth <= upper {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        let result = CycleResult {
            timestamp: chrono::Utc::now(),
            reference_height: round2(self.reference_height),
            min_height: round2(self.min_height),
            max_height: round2(self.max_height),
            weld_depth,
            pass_fail,
            model_id: model.as_deref().and_then(|m| m.id),
            model_name: model
                .as_deref()
                .map_or_else(|| "Unknown".to_string(), |m| m.name.clone()),
            model_type: model
                .as_deref()
                .map_or_else(|| "N/A".to_string(), |m| m.model_type.clone()),
        };

        info!(
            weld_depth = weld_depth,
            reference = result.reference_height,
            verdict = %result.pass_fail,
            model = %result.model_name,
            "Cycle complete"
        );

        self.cycles_completed += 1;
        self.reset();
        Some(result)
    }

    fn reset(&mut self) {
        self.in_cycle = false;
        self.reference_locked = false;
        self.in_welding = false;
        self.reference_height = 0.0;
        self.min_height = 0.0;
        self.max_height = 0.0;
        self.samples.clear();
        self.weld_samples.clear();
        self.prev_value = 0.0;
        self.stable_count = 0;
    }
}
