//! Shared data structures for the welding-station QC pipeline
//!
//! This module defines the core types flowing through the monitor:
//! - Frame decoding: PowerStatus, HeightSample
//! - Detection: DetectorParams, CycleResult, Verdict
//! - Model configuration: ActiveModel
//! - Link health: LinkStatus

use serde::{Deserialize, Serialize};

// ============================================================================
// Stream Events
// ============================================================================

/// PLC power/run status as reported on the shared serial stream.
///
/// Ephemeral — the gate overwrites its held copy on every new frame,
/// no history is retained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PowerStatus {
    /// Machine power, from the literal ON/OFF token.
    pub power: bool,
    /// Free-form state token (RUNNING, IDLE, FAULT, ALARM, OFFLINE, ...).
    pub state: String,
}

/// State token reported while no PLC frame has been received.
pub const OFFLINE_STATE: &str = "OFFLINE";

impl Default for PowerStatus {
    fn default() -> Self {
        Self {
            power: false,
            state: OFFLINE_STATE.to_string(),
        }
    }
}

/// One laser height reading, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSample {
    pub value: f64,
}

// ============================================================================
// Active Model
// ============================================================================

/// The currently activated part model: accept limits plus label metadata.
///
/// Delivered by the model provider as a whole record and cached behind an
/// atomic swap; the detector reads it only at cycle finalization. Limit
/// ordering (lower ≤ upper) is validated upstream, never here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveModel {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

fn default_model_type() -> String {
    "N/A".to_string()
}

/// Accept limits used before any model has ever been delivered.
pub const FALLBACK_LOWER_LIMIT: f64 = 0.0;
pub const FALLBACK_UPPER_LIMIT: f64 = 100.0;

// ============================================================================
// Detector Tuning
// ============================================================================

/// Tunable parameters of the cycle detector.
///
/// Held behind an `ArcSwap` so a runtime update is a single pointer
/// replacement, safe against a concurrent `push` on the pipeline task.
/// Heights and depths in millimeters, slopes in millimeters per sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorParams {
    /// Height above which a cycle is considered started/ongoing.
    pub threshold: f64,
    /// Per-sample downward slope magnitude that declares retraction.
    pub max_weld_slope: f64,
    /// Depth below reference beyond which retraction is declared
    /// (safety bound against runaway values).
    pub max_plausible_weld_depth: f64,
    /// Minimum weld-phase samples for a cycle to be valid.
    pub min_weld_samples: usize,
    /// Maximum per-sample slope magnitude considered "stable" while
    /// hunting for the reference height.
    pub reference_stable_slope: f64,
    /// Consecutive stable samples required to lock the reference.
    pub reference_stable_count: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_weld_slope: 2.5,
            max_plausible_weld_depth: 10.0,
            min_weld_samples: 5,
            reference_stable_slope: 0.4,
            reference_stable_count: 5,
        }
    }
}

// ============================================================================
// Cycle Result
// ============================================================================

/// Pass/fail verdict against the active model's accept band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// One completed, validated weld cycle.
///
/// Created once at finalization, immutable afterwards; handed to the result
/// sink and owned by external persistence from then on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleResult {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Stable height locked just before welding began (the depth zero-point).
    pub reference_height: f64,
    /// Minimum height observed during the welding phase.
    pub min_height: f64,
    /// Maximum height observed during the welding phase.
    pub max_height: f64,
    /// reference_height − min_height, rounded to 2 decimals.
    pub weld_depth: f64,
    pub pass_fail: Verdict,
    pub model_id: Option<i64>,
    pub model_name: String,
    pub model_type: String,
}

// ============================================================================
// Link Health
// ============================================================================

/// Connectivity of the shared serial stream, surfaced to the UI layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LinkStatus {
    Connected,
    #[default]
    Disconnected,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Connected => write!(f, "CONNECTED"),
            LinkStatus::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}
