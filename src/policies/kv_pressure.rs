//! KV-cache pressure filter

use super::FilterPolicy;
use crate::core::BackendSnapshot;
use crate::metrics::RouterMetrics;
use crate::scheduler::LlmRequest;
use tracing::warn;

/// Drops backends whose KV cache is close to full
///
/// When the strict ceiling empties the set the filter degrades to the
/// relaxed ceiling instead of failing the request outright.
#[derive(Debug)]
pub struct KvPressureFilter {
    ceiling: f64,
    relaxed: f64,
}

impl KvPressureFilter {
    pub fn new(ceiling: f64, relaxed: f64) -> Self {
        Self { ceiling, relaxed }
    }

    fn below(&self, candidates: &[BackendSnapshot], ceiling: f64) -> Vec<BackendSnapshot> {
        candidates
            .iter()
            .filter(|c| c.metrics.kv_cache_usage < ceiling)
            .cloned()
            .collect()
    }
}

impl FilterPolicy for KvPressureFilter {
    fn name(&self) -> &'static str {
        "kv_pressure"
    }

    fn filter(
        &self,
        _request: &LlmRequest,
        candidates: &[BackendSnapshot],
    ) -> Vec<BackendSnapshot> {
        let strict = self.below(candidates, self.ceiling);
        if !strict.is_empty() || candidates.is_empty() {
            return strict;
        }

        let relaxed = self.below(candidates, self.relaxed);
        if !relaxed.is_empty() {
            warn!(
                ceiling = self.ceiling,
                relaxed = self.relaxed,
                "all candidates above KV ceiling, relaxing threshold"
            );
            RouterMetrics::record_kv_pressure_relaxed();
        }
        relaxed
    }
}
