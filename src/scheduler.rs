//! Backend selection for one request
//!
//! The scheduler is stateless between calls: it reads an immutable snapshot
//! of the backend store, walks the filter tree and returns one backend. It
//! never reserves capacity; live metric feedback corrects concurrent
//! decisions that land on the same replica.

use crate::config::RouterConfig;
use crate::core::{BackendSnapshot, BackendStore, ScheduleError, ScheduleResult};
use crate::metrics::RouterMetrics;
use crate::policies::{
    AdapterAffinityFilter, CriticalityGate, DecisionNode, KvPressureFilter, LeastLoadedFilter,
    QueuePressureFilter,
};
use crate::registry::Criticality;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Request envelope the pipeline hands to the scheduler
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// User-visible model alias from the request body
    pub model: String,
    /// Concrete target model after traffic-split resolution
    pub resolved_target_model: String,
    pub criticality: Criticality,
    /// Per-request seed for the least-loaded tie-break
    pub request_id: u64,
}

impl LlmRequest {
    /// Whether resolution rewrote the alias to a concrete adapter
    ///
    /// The pool's base model resolves to itself; anything else is an
    /// adapter overlay loadable onto the base model.
    pub fn targets_adapter(&self) -> bool {
        self.resolved_target_model != self.model
    }
}

/// Policy engine selecting one backend per request
pub struct Scheduler {
    store: Arc<BackendStore>,
    gate: CriticalityGate,
    tree: DecisionNode,
    staleness: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<BackendStore>, config: &RouterConfig) -> Self {
        let gate = CriticalityGate::new(config.sheddable_saturation, config.sheddable_queue_depth);
        let tree = DecisionNode::chain(vec![
            Box::new(AdapterAffinityFilter::new()),
            Box::new(QueuePressureFilter::new(config.queue_margin)),
            Box::new(KvPressureFilter::new(
                config.kv_cache_ceiling,
                config.kv_cache_relaxed,
            )),
            Box::new(LeastLoadedFilter::new(config.score_weights)),
        ]);
        Self {
            store,
            gate,
            tree,
            staleness: config.metric_staleness(),
        }
    }

    /// Select a backend for the request, or reject it
    pub fn schedule(&self, request: &LlmRequest) -> ScheduleResult<BackendSnapshot> {
        let candidates: Vec<BackendSnapshot> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|c| !c.metrics.is_stale(self.staleness))
            .collect();

        if candidates.is_empty() {
            return Err(ScheduleError::NoBackends);
        }

        if self.gate.should_shed(request, &candidates) {
            RouterMetrics::record_shed();
            return Err(ScheduleError::Shed);
        }

        let chosen = self
            .tree
            .evaluate(request, &candidates)
            .into_iter()
            .next()
            .ok_or(ScheduleError::NoBackends)?;

        debug!(
            model = %request.model,
            target = %request.resolved_target_model,
            backend = chosen.address(),
            "scheduled request"
        );
        RouterMetrics::record_policy_decision(chosen.address());
        Ok(chosen)
    }
}
