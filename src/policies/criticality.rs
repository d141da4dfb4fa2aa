//! Admission gate for sheddable requests

use crate::core::BackendSnapshot;
use crate::registry::Criticality;
use crate::scheduler::LlmRequest;

/// Sheds `Sheddable` requests when the whole cluster is saturated
///
/// Saturation means every candidate is past the KV ceiling or has a deep
/// waiting queue. Critical and Standard requests always pass the gate.
#[derive(Debug, Clone)]
pub struct CriticalityGate {
    saturation: f64,
    queue_depth: u32,
}

impl CriticalityGate {
    pub fn new(saturation: f64, queue_depth: u32) -> Self {
        Self {
            saturation,
            queue_depth,
        }
    }

    pub fn should_shed(&self, request: &LlmRequest, candidates: &[BackendSnapshot]) -> bool {
        if request.criticality != Criticality::Sheddable {
            return false;
        }
        !candidates.is_empty()
            && candidates.iter().all(|c| {
                c.metrics.kv_cache_usage > self.saturation
                    || c.metrics.waiting_queue_size > self.queue_depth
            })
    }
}
