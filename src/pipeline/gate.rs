//! Power/run gating of laser samples
//!
//! The detector's state machine has no independent way to distinguish
//! "machine off" from "part retracted", so laser data is suppressed unless
//! the PLC confirms the machine is powered and in the running state.
//! Dropped samples are permanently lost — no buffering, no replay.

use tracing::{debug, info};

use crate::types::{HeightSample, PowerStatus};

/// Stateful filter holding the last-known PLC status.
///
/// Defaults to offline, so nothing is forwarded until the first PLC frame
/// arrives after startup or a reconnect.
#[derive(Debug)]
pub struct Gate {
    status: PowerStatus,
    running_state: String,
}

impl Gate {
    pub fn new(running_state: impl Into<String>) -> Self {
        Self {
            status: PowerStatus::default(),
            running_state: running_state.into(),
        }
    }

    /// Replace the held status unconditionally — no smoothing, no debounce.
    pub fn on_status(&mut self, status: PowerStatus) {
        if status != self.status {
            info!(power = status.power, state = %status.state, "PLC status changed");
        }
        self.status = status;
    }

    /// Whether laser samples are currently forwarded.
    pub fn forwarding(&self) -> bool {
        self.status.power && self.status.state == self.running_state
    }

    /// Forward a sample iff the machine is powered and running.
    pub fn offer(&self, sample: HeightSample) -> Option<HeightSample> {
        if self.forwarding() {
            Some(sample)
        } else {
            debug!(value = sample.value, state = %self.status.state, "Laser sample gated");
            None
        }
    }

    /// Fail-safe on transport loss: revert to the offline default so
    /// forwarding stops immediately until a fresh PLC frame arrives.
    pub fn mark_offline(&mut self) {
        self.status = PowerStatus::default();
    }

    /// The last-known PLC status.
    pub fn status(&self) -> &PowerStatus {
        &self.status
    }
}
