//! Backend identity and live metric types

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of a model-serving backend within the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendId {
    pub namespace: String,
    pub name: String,
}

impl BackendId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A model-serving replica reachable at an address
///
/// Backends are immutable during their lifetime; a replica whose address
/// changes is removed and re-created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub id: BackendId,
    /// host:port reachable inside the cluster
    pub address: String,
}

impl Backend {
    pub fn new(id: BackendId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// Live metrics reported by a backend
///
/// Updates replace the whole struct atomically; readers hold an `Arc` and
/// never observe a partial update.
#[derive(Debug, Clone)]
pub struct BackendMetrics {
    /// In-flight requests the backend reports
    pub active_requests: u32,
    /// Requests queued but not yet executing
    pub waiting_queue_size: u32,
    /// Fraction of KV cache consumed, in [0, 1]
    pub kv_cache_usage: f64,
    /// Adapter identifiers currently loaded
    pub active_adapters: HashSet<String>,
    /// Adapter slot capacity
    pub max_active_adapters: u32,
    /// When this sample was taken
    pub last_updated: Instant,
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self {
            active_requests: 0,
            waiting_queue_size: 0,
            kv_cache_usage: 0.0,
            active_adapters: HashSet::new(),
            max_active_adapters: 0,
            last_updated: Instant::now(),
        }
    }
}

impl BackendMetrics {
    /// Bound reported values to their valid ranges
    ///
    /// Scrapes are untrusted input; a sample with `kv_cache_usage` outside
    /// [0, 1] would invert the pressure and saturation comparisons.
    pub fn sanitize(mut self) -> Self {
        self.kv_cache_usage = self.kv_cache_usage.clamp(0.0, 1.0);
        self
    }

    pub fn age(&self) -> Duration {
        self.last_updated.elapsed()
    }

    pub fn is_stale(&self, staleness: Duration) -> bool {
        self.age() > staleness
    }

    pub fn has_adapter(&self, name: &str) -> bool {
        self.active_adapters.contains(name)
    }

    /// Whether the backend has room to load one more adapter
    pub fn has_adapter_room(&self) -> bool {
        (self.active_adapters.len() as u32) < self.max_active_adapters
    }
}

/// An immutable view of one backend with its latest metrics
///
/// Snapshots are cheap to clone; both fields are shared pointers into the
/// store's current state.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    pub backend: Arc<Backend>,
    pub metrics: Arc<BackendMetrics>,
}

impl BackendSnapshot {
    pub fn address(&self) -> &str {
        &self.backend.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_display() {
        let backend = Backend::new(BackendId::new("prod", "vllm-0"), "10.0.0.1:8000");
        assert_eq!(backend.to_string(), "prod/vllm-0@10.0.0.1:8000");
    }

    #[test]
    fn test_staleness() {
        let metrics = BackendMetrics {
            last_updated: Instant::now() - Duration::from_secs(10),
            ..Default::default()
        };
        assert!(metrics.is_stale(Duration::from_secs(5)));
        assert!(!metrics.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn test_adapter_room() {
        let mut metrics = BackendMetrics {
            max_active_adapters: 2,
            ..Default::default()
        };
        assert!(metrics.has_adapter_room());

        metrics.active_adapters.insert("a".to_string());
        metrics.active_adapters.insert("b".to_string());
        assert!(!metrics.has_adapter_room());
        assert!(metrics.has_adapter("a"));
        assert!(!metrics.has_adapter("c"));
    }
}
