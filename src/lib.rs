//! Weldwatch: laser weld-depth quality monitoring
//!
//! Real-time QC monitor for a pneumatic welding station. A laser distance
//! sensor and a PLC share one serial stream (reached through a
//! serial-over-TCP bridge); the monitor demultiplexes the stream, gates
//! laser data on the PLC's power/run state, detects weld cycles, and hands
//! pass/fail results off for persistence and alerting.
//!
//! ## Architecture
//!
//! - **Frame Decoder**: line → typed PLC-status / laser-height event
//! - **Gate**: suppresses laser data unless the machine is powered and running
//! - **Cycle Detector**: reference-lock → welding → retraction state machine
//! - **Model Provider**: atomic-swapped accept limits, file-snapshot watcher
//! - **Line Sources**: TCP bridge (reconnect + liveness), stdin, replay

pub mod acquisition;
pub mod config;
pub mod detector;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod types;

// Re-export station configuration
pub use config::StationConfig;

// Re-export commonly used types
pub use types::{
    ActiveModel, CycleResult, DetectorParams, HeightSample, LinkStatus, PowerStatus, Verdict,
};

// Re-export the pipeline components
pub use acquisition::{decode_line, Frame, LineClient, LinkError};
pub use detector::CycleDetector;
pub use model::ModelStore;
pub use pipeline::{Gate, LineSource, PipelineStats, ProcessingLoop, ReplaySource, StreamEvent};
pub use sink::{CycleLog, SinkError};
