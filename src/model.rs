//! Model cache: one live storage handle per canonical model name.
//!
//! Handles are access tokens, not data owners. Replacing a handle detaches the
//! old one: in-flight operations that already hold it may finish, later
//! acquisitions observe the detached flag and fail with `StaleHandle`. Backing
//! collections are keyed by model name and survive handle turnover, so an
//! entity that fails to recompile keeps its previous handle and its data stays
//! reachable under the old route.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Live reference to a model's backing collection.
#[derive(Debug)]
pub struct ModelHandle {
    model: String,
    generation: u64,
    detached: AtomicBool,
}

impl ModelHandle {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

#[derive(Default)]
pub struct ModelCache {
    handles: Mutex<HashMap<String, Arc<ModelHandle>>>,
    next_generation: AtomicU64,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh handle for `model`, detaching any existing one first.
    /// At most one live (non-detached) handle exists per model name.
    pub fn get_or_create(&self, model: &str) -> Arc<ModelHandle> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(ModelHandle {
            model: model.to_string(),
            generation,
            detached: AtomicBool::new(false),
        });
        let mut handles = self.handles.lock().expect("model cache poisoned");
        if let Some(old) = handles.insert(model.to_string(), Arc::clone(&handle)) {
            tracing::debug!(model, old_generation = old.generation, "detaching superseded handle");
            old.detach();
        }
        handle
    }

    /// Detach and drop handles for models not in `keep`. Called after a
    /// successful schema update for entities that vanished from the document.
    pub fn retain(&self, keep: &HashSet<String>) {
        let mut handles = self.handles.lock().expect("model cache poisoned");
        handles.retain(|model, handle| {
            if keep.contains(model) {
                true
            } else {
                tracing::debug!(model, "evicting model removed from schema");
                handle.detach();
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.handles.lock().expect("model cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreate_detaches_the_old_handle() {
        let cache = ModelCache::new();
        let first = cache.get_or_create("Items");
        let second = cache.get_or_create("Items");
        assert!(first.is_detached());
        assert!(!second.is_detached());
        assert!(second.generation() > first.generation());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn retain_evicts_and_detaches_removed_models() {
        let cache = ModelCache::new();
        let items = cache.get_or_create("Items");
        let orders = cache.get_or_create("Orders");
        let keep: HashSet<String> = ["Items".to_string()].into();
        cache.retain(&keep);
        assert!(!items.is_detached());
        assert!(orders.is_detached());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn in_flight_holders_keep_a_usable_reference() {
        let cache = ModelCache::new();
        let held = cache.get_or_create("Items");
        cache.get_or_create("Items");
        // The Arc is still alive; only the detached flag changed.
        assert_eq!(held.model(), "Items");
        assert!(held.is_detached());
    }
}
