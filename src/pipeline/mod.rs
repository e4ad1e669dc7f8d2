//! The decode → gate → detect pipeline
//!
//! One dedicated reader task pulls raw lines from a [`LineSource`] and runs
//! the whole pipeline for each line to completion before the next — the
//! detector's state machine depends on in-order, unbatched samples.

pub mod gate;
pub mod processing_loop;
pub mod source;

pub use gate::Gate;
pub use processing_loop::{PipelineStats, ProcessingLoop};
pub use source::{LineSource, ReplaySource, StdinSource, StreamEvent, TcpLineSource};
