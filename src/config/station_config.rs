//! Station configuration — all link timing and detector tunables as
//! operator-editable TOML values.
//!
//! Each struct implements `Default` with values matching the plant's
//! commissioning constants, so behavior is unchanged when no config file is
//! present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::DetectorParams;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one welding-station deployment.
///
/// Load with `StationConfig::load()` which searches:
/// 1. `$WELDWATCH_CONFIG` env var
/// 2. `./station_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationConfig {
    /// Station identification
    #[serde(default)]
    pub station: StationInfo,

    /// Serial-stream link and reconnect timing
    #[serde(default)]
    pub link: LinkConfig,

    /// Cycle detector tuning
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Active-model snapshot source
    #[serde(default)]
    pub model: ModelSourceConfig,

    /// Cycle result log
    #[serde(default)]
    pub results: ResultLogConfig,
}

/// Station identification, stamped into logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationInfo {
    #[serde(default = "default_station_name")]
    pub name: String,
}

fn default_station_name() -> String {
    "welding-station-1".to_string()
}

impl Default for StationInfo {
    fn default() -> Self {
        Self {
            name: default_station_name(),
        }
    }
}

// ============================================================================
// Link Config
// ============================================================================

/// Shared serial stream link settings.
///
/// The station hardware is reached through a serial-over-TCP bridge; the
/// PLC and laser multiplex onto the one line-oriented stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Bridge host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bridge port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// No frame of either kind within this window means the stream is lost
    /// and a reconnect is forced.
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_secs: f64,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: f64,
    /// Outage longer than this clears any in-flight weld cycle once the
    /// link is back.
    #[serde(default = "default_prolonged_outage")]
    pub prolonged_outage_secs: f64,
    /// PLC state token that permits laser forwarding.
    #[serde(default = "default_running_state")]
    pub running_state: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7777
}

fn default_liveness_timeout() -> f64 {
    5.0
}

fn default_reconnect_delay() -> f64 {
    1.5
}

fn default_prolonged_outage() -> f64 {
    10.0
}

fn default_running_state() -> String {
    "RUNNING".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            liveness_timeout_secs: default_liveness_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
            prolonged_outage_secs: default_prolonged_outage(),
            running_state: default_running_state(),
        }
    }
}

// ============================================================================
// Detector Config
// ============================================================================

/// Cycle detector tuning. Mirrors [`DetectorParams`]; kept as a separate
/// serde struct so the TOML surface can evolve independently of the
/// hot-swapped runtime params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_weld_slope")]
    pub max_weld_slope: f64,
    #[serde(default = "default_max_plausible_weld_depth")]
    pub max_plausible_weld_depth: f64,
    #[serde(default = "default_min_weld_samples")]
    pub min_weld_samples: usize,
    #[serde(default = "default_reference_stable_slope")]
    pub reference_stable_slope: f64,
    #[serde(default = "default_reference_stable_count")]
    pub reference_stable_count: u32,
}

fn default_threshold() -> f64 {
    5.0
}

fn default_max_weld_slope() -> f64 {
    2.5
}

fn default_max_plausible_weld_depth() -> f64 {
    10.0
}

fn default_min_weld_samples() -> usize {
    5
}

fn default_reference_stable_slope() -> f64 {
    0.4
}

fn default_reference_stable_count() -> u32 {
    5
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_weld_slope: default_max_weld_slope(),
            max_plausible_weld_depth: default_max_plausible_weld_depth(),
            min_weld_samples: default_min_weld_samples(),
            reference_stable_slope: default_reference_stable_slope(),
            reference_stable_count: default_reference_stable_count(),
        }
    }
}

impl DetectorConfig {
    /// Convert into the hot-swapped runtime params.
    pub fn to_params(&self) -> DetectorParams {
        DetectorParams {
            threshold: self.threshold,
            max_weld_slope: self.max_weld_slope,
            max_plausible_weld_depth: self.max_plausible_weld_depth,
            min_weld_samples: self.min_weld_samples,
            reference_stable_slope: self.reference_stable_slope,
            reference_stable_count: self.reference_stable_count,
        }
    }
}

// ============================================================================
// Model Source & Result Log
// ============================================================================

/// Where the active-model snapshot comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSourceConfig {
    /// JSON snapshot written by the external model store.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Snapshot poll interval.
    #[serde(default = "default_model_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("active_model.json")
}

fn default_model_poll_ms() -> u64 {
    500
}

impl Default for ModelSourceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            poll_interval_ms: default_model_poll_ms(),
        }
    }
}

/// Where completed cycles are appended for the external persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultLogConfig {
    #[serde(default = "default_result_log_path")]
    pub path: PathBuf,
}

fn default_result_log_path() -> PathBuf {
    PathBuf::from("data/cycles.jsonl")
}

impl Default for ResultLogConfig {
    fn default() -> Self {
        Self {
            path: default_result_log_path(),
        }
    }
}

// ============================================================================
// Loading & Validation
// ============================================================================

/// Configuration loading/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl StationConfig {
    /// Load configuration using the standard search order:
    /// 1. `$WELDWATCH_CONFIG` environment variable
    /// 2. `./station_config.toml` in the current working directory
    /// 3. Built-in defaults (commissioning values)
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("WELDWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), station = %config.station.name, "Loaded station config from WELDWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from WELDWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "WELDWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("station_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(station = %config.station.name, "Loaded station config from ./station_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./station_config.toml, using defaults");
                }
            }
        }

        info!("No station_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tunables that would wedge the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.liveness_timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "link.liveness_timeout_secs must be positive".to_string(),
            ));
        }
        if self.link.reconnect_delay_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "link.reconnect_delay_secs must not be negative".to_string(),
            ));
        }
        if self.link.running_state.is_empty() {
            return Err(ConfigError::Invalid(
                "link.running_state must not be empty".to_string(),
            ));
        }
        if self.detector.threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "detector.threshold must be positive".to_string(),
            ));
        }
        if self.detector.max_weld_slope <= 0.0 {
            return Err(ConfigError::Invalid(
                "detector.max_weld_slope must be positive".to_string(),
            ));
        }
        if self.detector.max_plausible_weld_depth <= 0.0 {
            return Err(ConfigError::Invalid(
                "detector.max_plausible_weld_depth must be positive".to_string(),
            ));
        }
        if self.detector.min_weld_samples == 0 {
            return Err(ConfigError::Invalid(
                "detector.min_weld_samples must be at least 1".to_string(),
            ));
        }
        if self.detector.reference_stable_count == 0 {
            return Err(ConfigError::Invalid(
                "detector.reference_stable_count must be at least 1".to_string(),
            ));
        }
        if self.model.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "model.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
