//! Station Configuration Module
//!
//! Provides per-station configuration loaded from TOML files: link and
//! reconnect timing, detector tuning, model snapshot location, result log.
//!
//! ## Loading Order
//!
//! 1. `WELDWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `station_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(StationConfig::load());
//!
//! // Anywhere in the codebase:
//! let timeout = config::get().link.liveness_timeout_secs;
//! ```

mod station_config;

pub use station_config::*;

use std::sync::OnceLock;

/// Global station configuration, initialized once at startup.
static STATION_CONFIG: OnceLock<StationConfig> = OnceLock::new();

/// Initialize the global station configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: StationConfig) {
    if STATION_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global station configuration.
///
/// Panics if `init()` has not been called. This is by design — a missing
/// config is a fatal startup error, not a recoverable condition.
pub fn get() -> &'static StationConfig {
    STATION_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized.
///
/// Useful for tests and optional config paths.
pub fn is_initialized() -> bool {
    STATION_CONFIG.get().is_some()
}
