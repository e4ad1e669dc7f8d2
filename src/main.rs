//! Weldwatch - pneumatic welding station QC monitor
//!
//! Reads the shared PLC + laser stream, detects weld cycles, and hands
//! pass/fail results off for persistence and alerting.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the station's serial-over-TCP bridge
//! weldwatch --tcp 192.168.0.40:7777
//!
//! # Run against the simulator
//! simulate | weldwatch --stdin
//!
//! # Replay a captured line log
//! weldwatch --replay capture.txt --delay-ms 40
//! ```
//!
//! # Environment Variables
//!
//! - `WELDWATCH_CONFIG`: Path to the station TOML config
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use weldwatch::config::{self, StationConfig};
use weldwatch::detector::CycleDetector;
use weldwatch::model::{watcher::run_model_watcher, ModelStore};
use weldwatch::pipeline::{Gate, ProcessingLoop, ReplaySource, StdinSource, TcpLineSource};
use weldwatch::sink::{run_result_sink, CycleLog};
use weldwatch::types::LinkStatus;
use weldwatch::LineClient;

/// Capacity of the result handoff channel. Cycles complete every few
/// seconds at most; a backlog this deep means the sink is wedged.
const RESULT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "weldwatch")]
#[command(about = "Pneumatic welding station QC monitor")]
#[command(version)]
struct CliArgs {
    /// Read stream lines from stdin instead of the TCP bridge.
    /// Use with the simulator: simulate | weldwatch --stdin
    #[arg(long)]
    stdin: bool,

    /// Serial-over-TCP bridge address, overriding the config file.
    /// Example: weldwatch --tcp 192.168.0.40:7777
    #[arg(long, value_name = "HOST:PORT")]
    tcp: Option<String>,

    /// Replay a captured line log file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed lines in milliseconds (with --replay)
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Path to the station config TOML (overrides WELDWATCH_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Load station configuration
    let station_config = match args.config {
        Some(ref path) => {
            StationConfig::load_from_file(path).context("Failed to load --config file")?
        }
        None => StationConfig::load(),
    };
    info!(
        "Station: {} | Running state: {} | Threshold: {:.2} mm",
        station_config.station.name,
        station_config.link.running_state,
        station_config.detector.threshold
    );
    config::init(station_config);
    let cfg = config::get();

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    // Active-model provider: snapshot watcher keeps the cache current;
    // the detector gets the limits handle injected at construction.
    let model_store = Arc::new(ModelStore::new());
    model_store.register_listener(|model| {
        info!(
            name = %model.name,
            lower = model.lower_limit,
            upper = model.upper_limit,
            "Detector model applied"
        );
    });
    let watcher_task = tokio::spawn(run_model_watcher(
        cfg.model.snapshot_path.clone(),
        Duration::from_millis(cfg.model.poll_interval_ms),
        Arc::clone(&model_store),
        cancel_token.clone(),
    ));

    // Result sink: JSONL handoff log for the external persistence layer
    let (results_tx, results_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
    let cycle_log = match CycleLog::open(&cfg.results.path) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!(path = %cfg.results.path.display(), error = %e, "Result log unavailable — results will not be persisted");
            None
        }
    };
    let sink_task = tokio::spawn(run_result_sink(
        results_rx,
        cycle_log,
        cancel_token.clone(),
    ));

    // Connectivity indicator for the external UI layer
    let (status_tx, status_rx) = watch::channel(LinkStatus::Disconnected);
    drop(status_rx); // no UI attached in the headless binary

    let gate = Gate::new(cfg.link.running_state.clone());
    let detector = CycleDetector::new(cfg.detector.to_params(), model_store.limits_handle());
    let pipeline = ProcessingLoop::new(
        gate,
        detector,
        results_tx,
        status_tx,
        cancel_token.clone(),
        Duration::from_secs_f64(cfg.link.prolonged_outage_secs),
    );

    // Dispatch to the pipeline with the appropriate source
    let stats = if args.stdin {
        info!("📥 Input: stdin (simulator stream)");
        let mut source = StdinSource::new();
        pipeline.run(&mut source).await
    } else if let Some(ref path) = args.replay {
        info!("📥 Input: replay of {}", path.display());
        let contents =
            std::fs::read_to_string(path).context("Failed to read --replay file")?;
        let lines: Vec<String> = contents.lines().map(str::to_string).collect();
        info!("{} lines queued for replay", lines.len());
        let mut source = ReplaySource::from_lines(lines, args.delay_ms);
        pipeline.run(&mut source).await
    } else {
        let (host, port) = match args.tcp {
            Some(ref addr) => parse_bridge_addr(addr)?,
            None => (cfg.link.host.clone(), cfg.link.port),
        };
        info!("📥 Input: serial-over-TCP bridge at {}:{}", host, port);
        let client = LineClient::new(
            &host,
            port,
            Duration::from_secs_f64(cfg.link.liveness_timeout_secs),
            Duration::from_secs_f64(cfg.link.reconnect_delay_secs),
        );
        let mut source = TcpLineSource::connect(client).await?;
        pipeline.run(&mut source).await
    };

    // Pipeline is done — wind down the helper tasks
    cancel_token.cancel();
    let _ = watcher_task.await;
    let _ = sink_task.await;

    info!(
        "✓ Weldwatch shutdown complete ({} cycles, {} rejected)",
        stats.cycles_completed, stats.cycles_rejected
    );
    Ok(())
}

/// Split a HOST:PORT bridge address.
fn parse_bridge_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .context("Invalid bridge address format. Expected HOST:PORT")?;
    let port: u16 = port.parse().context("Invalid port number")?;
    Ok((host.to_string(), port))
}
