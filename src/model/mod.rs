//! Active-model provider
//!
//! The plant's model store (an external system) decides which part model is
//! active; this module caches the last delivered record and fans changes out
//! to in-process consumers. The cache is an atomic whole-record swap — the
//! detector reads it lock-free at finalize time while updates land from the
//! watcher task.
//!
//! No process-wide singleton: consumers receive the store (or its limits
//! handle) explicitly at construction.

pub mod watcher;

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use tracing::{info, warn};

use crate::types::ActiveModel;

type ModelListener = Box<dyn Fn(&ActiveModel) + Send + Sync>;

/// Cached active model plus a change-listener registry.
pub struct ModelStore {
    cached: Arc<ArcSwapOption<ActiveModel>>,
    listeners: Mutex<Vec<ModelListener>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self {
            cached: Arc::new(ArcSwapOption::empty()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The shared cache handle, for injecting into the detector.
    pub fn limits_handle(&self) -> Arc<ArcSwapOption<ActiveModel>> {
        Arc::clone(&self.cached)
    }

    /// Last delivered model, if any.
    pub fn get_cached_model(&self) -> Option<Arc<ActiveModel>> {
        self.cached.load_full()
    }

    /// Register a change callback. The last-known value, if any, is
    /// replayed immediately so late registrants start in sync.
    pub fn register_listener<F>(&self, callback: F)
    where
        F: Fn(&ActiveModel) + Send + Sync + 'static,
    {
        if let Some(current) = self.cached.load_full() {
            callback(&current);
        }
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(Box::new(callback)),
            Err(poisoned) => poisoned.into_inner().push(Box::new(callback)),
        }
    }

    /// Install a newly delivered model record.
    ///
    /// A record identical to the cached one is an absolute no-op; otherwise
    /// the cache is swapped atomically and listeners are notified.
    pub fn install(&self, model: ActiveModel) {
        if let Some(current) = self.cached.load_full() {
            if *current == model {
                return;
            }
        }

        info!(
            id = ?model.id,
            name = %model.name,
            lower = model.lower_limit,
            upper = model.upper_limit,
            "Active model updated"
        );
        if model.lower_limit > model.upper_limit {
            // The detector only compares; ordering is the store's job.
            warn!(
                lower = model.lower_limit,
                upper = model.upper_limit,
                "Active model has inverted limits — every cycle will fail"
            );
        }

        let model = Arc::new(model);
        self.cached.store(Some(Arc::clone(&model)));

        match self.listeners.lock() {
            Ok(listeners) => {
                for listener in listeners.iter() {
                    listener(&model);
                }
            }
            Err(poisoned) => {
                for listener in poisoned.into_inner().iter() {
                    listener(&model);
                }
            }
        }
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model(name: &str, lower: f64, upper: f64) -> ActiveModel {
        ActiveModel {
            id: Some(1),
            name: name.to_string(),
            model_type: "LHD".to_string(),
            lower_limit: lower,
            upper_limit: upper,
        }
    }

    #[test]
    fn install_updates_cache_and_notifies() {
        let store = ModelStore::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        store.register_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.get_cached_model().is_none());
        store.install(model("A", 1.0, 5.0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get_cached_model().map(|m| m.name.clone()),
            Some("A".to_string())
        );
    }

    #[test]
    fn identical_record_is_noop() {
        let store = ModelStore::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        store.register_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.install(model("A", 1.0, 5.0));
        store.install(model("A", 1.0, 5.0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // A limit edit on the same model is a real change.
        store.install(model("A", 1.0, 6.0));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn late_registrant_gets_replay() {
        let store = ModelStore::new();
        store.install(model("A", 1.0, 5.0));

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.register_listener(move |m| {
            assert_eq!(m.name, "A");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn limits_handle_sees_installs() {
        let store = ModelStore::new();
        let handle = store.limits_handle();
        store.install(model("A", 1.0, 5.0));
        assert_eq!(handle.load_full().map(|m| m.lower_limit), Some(1.0));
    }
}
