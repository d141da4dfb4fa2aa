//! Concurrent store of backends and their live metrics
//!
//! Many readers, single writer per backend. Writers swap an `Arc` so readers
//! never observe a torn metrics struct; snapshots may lag a concurrent update.

use crate::core::{Backend, BackendId, BackendMetrics, BackendSnapshot};
use crate::metrics::RouterMetrics;
use dashmap::DashMap;
use std::sync::Arc;

struct BackendEntry {
    backend: Arc<Backend>,
    metrics: Option<Arc<BackendMetrics>>,
}

/// In-memory set of backends with live metrics
///
/// The store never evicts on staleness; consumers filter by metric age.
/// A backend registered without metrics is invisible to `snapshot`.
#[derive(Default)]
pub struct BackendStore {
    entries: DashMap<BackendId, BackendEntry>,
}

impl BackendStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a backend without metrics (discovery seam)
    ///
    /// An existing entry keeps its metrics unless the address changed, in
    /// which case the old replica is gone and its metrics no longer apply.
    pub fn register(&self, backend: Backend) {
        let id = backend.id.clone();
        let same_address = self
            .entries
            .get(&id)
            .is_some_and(|entry| entry.backend.address == backend.address);
        if !same_address {
            self.entries.insert(
                id,
                BackendEntry {
                    backend: Arc::new(backend),
                    metrics: None,
                },
            );
        }
        RouterMetrics::set_backend_count(self.len());
    }

    /// Replace metrics for a backend, creating the entry if absent
    pub fn upsert(&self, backend: Backend, metrics: BackendMetrics) {
        self.entries.insert(
            backend.id.clone(),
            BackendEntry {
                backend: Arc::new(backend),
                metrics: Some(Arc::new(metrics.sanitize())),
            },
        );
        RouterMetrics::set_backend_count(self.len());
    }

    /// Replace metrics for an already-known backend
    ///
    /// Returns false when the backend is not present; that is normal during
    /// discovery churn and the caller just drops the sample.
    pub fn update_metrics(&self, id: &BackendId, metrics: BackendMetrics) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.metrics = Some(Arc::new(metrics.sanitize()));
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &BackendId) -> Option<Arc<Backend>> {
        let removed = self.entries.remove(id).map(|(_, entry)| entry.backend);
        RouterMetrics::set_backend_count(self.len());
        removed
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Immutable view of every backend that currently has metrics
    ///
    /// Copies shared pointers only; no lock is held after return, so the
    /// scheduler can take its time without blocking writers.
    pub fn snapshot(&self) -> Vec<BackendSnapshot> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry.metrics.as_ref().map(|metrics| BackendSnapshot {
                    backend: entry.backend.clone(),
                    metrics: metrics.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn backend(name: &str, address: &str) -> Backend {
        Backend::new(BackendId::new("default", name), address)
    }

    #[test]
    fn test_upsert_and_snapshot() {
        let store = BackendStore::new();
        store.upsert(
            backend("b0", "10.0.0.1:8000"),
            BackendMetrics {
                waiting_queue_size: 3,
                ..Default::default()
            },
        );
        store.upsert(backend("b1", "10.0.0.2:8000"), BackendMetrics::default());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.len(), 2);

        let b0 = snapshot
            .iter()
            .find(|s| s.address() == "10.0.0.1:8000")
            .unwrap();
        assert_eq!(b0.metrics.waiting_queue_size, 3);
    }

    #[test]
    fn test_registered_without_metrics_is_invisible() {
        let store = BackendStore::new();
        store.register(backend("b0", "10.0.0.1:8000"));

        assert!(store.contains(&BackendId::new("default", "b0")));
        assert_eq!(store.len(), 1);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_update_replaces_metrics_atomically() {
        let store = BackendStore::new();
        let id = BackendId::new("default", "b0");
        store.upsert(backend("b0", "10.0.0.1:8000"), BackendMetrics::default());

        let before = store.snapshot()[0].metrics.clone();
        assert!(store.update_metrics(
            &id,
            BackendMetrics {
                kv_cache_usage: 0.5,
                last_updated: Instant::now(),
                ..Default::default()
            }
        ));

        // The old Arc still reads its original values
        assert_eq!(before.kv_cache_usage, 0.0);
        assert_eq!(store.snapshot()[0].metrics.kv_cache_usage, 0.5);
    }

    #[test]
    fn test_update_metrics_for_unknown_backend() {
        let store = BackendStore::new();
        assert!(!store.update_metrics(
            &BackendId::new("default", "ghost"),
            BackendMetrics::default()
        ));
    }

    #[test]
    fn test_out_of_range_kv_usage_clamped_on_ingest() {
        let store = BackendStore::new();
        let id = BackendId::new("default", "b0");
        store.upsert(
            backend("b0", "10.0.0.1:8000"),
            BackendMetrics {
                kv_cache_usage: 1.7,
                ..Default::default()
            },
        );
        assert_eq!(store.snapshot()[0].metrics.kv_cache_usage, 1.0);

        assert!(store.update_metrics(
            &id,
            BackendMetrics {
                kv_cache_usage: -0.3,
                ..Default::default()
            }
        ));
        assert_eq!(store.snapshot()[0].metrics.kv_cache_usage, 0.0);
    }

    #[test]
    fn test_remove() {
        let store = BackendStore::new();
        let id = BackendId::new("default", "b0");
        store.upsert(backend("b0", "10.0.0.1:8000"), BackendMetrics::default());

        let removed = store.remove(&id).unwrap();
        assert_eq!(removed.address, "10.0.0.1:8000");
        assert!(store.is_empty());
        assert!(store.remove(&id).is_none());
    }

    #[test]
    fn test_address_change_drops_stale_metrics() {
        let store = BackendStore::new();
        store.upsert(backend("b0", "10.0.0.1:8000"), BackendMetrics::default());

        // Same identity comes back at a new address: re-created, not mutated
        store.register(backend("b0", "10.0.0.9:8000"));

        assert_eq!(store.len(), 1);
        assert!(store.snapshot().is_empty());
    }
}
