//! Cycle result sink
//!
//! Consumes finished cycles from the pipeline's mpsc channel: logs every
//! verdict (FAIL at warn level — alerting consumers key off it) and appends
//! each record to a JSONL handoff log for the external persistence layer.
//! Sink failures never travel back into the sampling path.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::{CycleResult, Verdict};

/// Result log errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Result log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only JSONL log of completed cycles — the handoff record an
/// external persistence layer consumes.
pub struct CycleLog {
    path: PathBuf,
}

impl CycleLog {
    /// Prepare the log location, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Append one result as a single JSON line.
    pub fn append(&self, result: &CycleResult) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(result)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Drain the result channel until it closes or cancellation.
pub async fn run_result_sink(
    mut results_rx: mpsc::Receiver<CycleResult>,
    log: Option<CycleLog>,
    cancel_token: CancellationToken,
) {
    loop {
        // Biased: queued results are written out before cancellation is
        // observed, so a shutdown never loses a finished cycle.
        let result = tokio::select! {
            biased;
            result = results_rx.recv() => {
                match result {
                    Some(r) => r,
                    None => {
                        debug!("Result channel closed — sink stopping");
                        return;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                debug!("Result sink cancelled");
                return;
            }
        };

        match result.pass_fail {
            Verdict::Pass => info!(
                weld_depth = result.weld_depth,
                model = %result.model_name,
                "Cycle PASS"
            ),
            Verdict::Fail => warn!(
                weld_depth = result.weld_depth,
                model = %result.model_name,
                "Cycle FAIL"
            ),
        }

        if let Some(ref log) = log {
            if let Err(e) = log.append(&result) {
                warn!(path = %log.path().display(), error = %e, "Failed to append cycle result");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;

    fn result(depth: f64, verdict: Verdict) -> CycleResult {
        CycleResult {
            timestamp: chrono::Utc::now(),
            reference_height: 52.10,
            min_height: 52.10 - depth,
            max_height: 52.30,
            weld_depth: depth,
            pass_fail: verdict,
            model_id: Some(1),
            model_name: "G510-A".to_string(),
            model_type: "LHD".to_string(),
        }
    }

    #[test]
    fn append_writes_one_json_line_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/cycles.jsonl");
        let log = CycleLog::open(&path).unwrap();

        log.append(&result(2.5, Verdict::Pass)).unwrap();
        log.append(&result(0.1, Verdict::Fail)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: CycleResult = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.weld_depth, 2.5);
        assert_eq!(first.pass_fail, Verdict::Pass);

        let second: CycleResult = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.pass_fail, Verdict::Fail);
    }

    #[test]
    fn verdict_serializes_as_plant_convention() {
        let json = serde_json::to_string(&result(1.0, Verdict::Pass)).unwrap();
        assert!(json.contains("\"pass_fail\":\"PASS\""));
    }

    #[tokio::test]
    async fn sink_drains_until_channel_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.jsonl");
        let log = CycleLog::open(&path).unwrap();

        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_result_sink(rx, Some(log), cancel));

        tx.send(result(2.0, Verdict::Pass)).await.unwrap();
        tx.send(result(9.0, Verdict::Fail)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
