//! Polling-based active-model snapshot watcher.
//!
//! The external model store persists the activated model to a JSON snapshot
//! file; this task polls the file's mtime, debounces briefly (partial
//! writes), parses, and installs the record into the [`ModelStore`]. A
//! missing or malformed snapshot keeps the previous model active.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ModelStore;
use crate::types::ActiveModel;

/// Debounce delay after detecting a change (writers replace in stages).
const DEBOUNCE_DELAY: Duration = Duration::from_millis(200);

/// Snapshot loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load the snapshot file once. Used at startup for the last-known value
/// and by the watcher on every detected change.
pub fn load_snapshot(path: &Path) -> Result<ActiveModel, ModelError> {
    let contents = std::fs::read_to_string(path)?;
    let model: ActiveModel = serde_json::from_str(&contents)?;
    Ok(model)
}

/// Run the snapshot watcher loop.
///
/// Polls `path` for mtime changes and installs the parsed record on change.
/// Returns when cancelled.
pub async fn run_model_watcher(
    path: PathBuf,
    poll_interval: Duration,
    store: Arc<ModelStore>,
    cancel_token: CancellationToken,
) {
    info!(path = %path.display(), "Model watcher started");

    // Deliver the last-known value once at startup, if a snapshot exists.
    let mut last_mtime = get_mtime(&path);
    if last_mtime.is_some() {
        match load_snapshot(&path) {
            Ok(model) => store.install(model),
            Err(e) => {
                warn!(error = %e, "Initial model snapshot unreadable — starting without a model");
            }
        }
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Model watcher cancelled");
                return;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let current = match get_mtime(&path) {
            Some(t) => t,
            None => {
                // Only warn on the transition (file deleted / not yet written)
                if last_mtime.is_some() {
                    warn!(
                        path = %path.display(),
                        "Model snapshot not accessible — keeping current model, will retry"
                    );
                    last_mtime = None;
                }
                continue;
            }
        };

        let changed = match last_mtime {
            Some(prev) => current != prev,
            None => true, // File appeared
        };

        if !changed {
            continue;
        }

        // Debounce: wait, then re-check mtime to ensure the write finished
        tokio::time::sleep(DEBOUNCE_DELAY).await;

        let stable_mtime = get_mtime(&path);
        if stable_mtime != Some(current) {
            // Still changing — pick it up on the next poll cycle
            continue;
        }

        last_mtime = Some(current);

        match load_snapshot(&path) {
            Ok(model) => store.install(model),
            Err(e) => {
                warn!(error = %e, "Model snapshot reload failed — keeping previous model");
            }
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_snapshot(path: &Path, name: &str, lower: f64, upper: f64) {
        let json = serde_json::json!({
            "id": 3,
            "name": name,
            "model_type": "LHD",
            "lower_limit": lower,
            "upper_limit": upper,
        });
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();
    }

    #[test]
    fn load_snapshot_parses_model_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_model.json");
        write_snapshot(&path, "G510-A", 1.5, 4.0);

        let model = load_snapshot(&path).unwrap();
        assert_eq!(model.id, Some(3));
        assert_eq!(model.name, "G510-A");
        assert_eq!(model.lower_limit, 1.5);
        assert_eq!(model.upper_limit, 4.0);
    }

    #[test]
    fn load_snapshot_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(load_snapshot(&missing), Err(ModelError::Io(_))));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(load_snapshot(&bad), Err(ModelError::Parse(_))));
    }

    #[tokio::test]
    async fn watcher_installs_snapshot_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_model.json");
        let store = Arc::new(ModelStore::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_model_watcher(
            path.clone(),
            Duration::from_millis(20),
            Arc::clone(&store),
            cancel.clone(),
        ));

        // Snapshot appears after the watcher is already running.
        write_snapshot(&path, "G510-B", 2.0, 6.0);

        let mut installed = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if let Some(model) = store.get_cached_model() {
                installed = Some(model);
                break;
            }
        }

        cancel.cancel();
        task.await.unwrap();

        let model = installed.expect("watcher should install the snapshot");
        assert_eq!(model.name, "G510-B");
        assert_eq!(model.upper_limit, 6.0);
    }
}
