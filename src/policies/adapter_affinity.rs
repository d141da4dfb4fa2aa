//! LoRA adapter affinity filter

use super::FilterPolicy;
use crate::core::BackendSnapshot;
use crate::scheduler::LlmRequest;

/// Prefers backends that already host the requested adapter
///
/// Falls back to backends with a free adapter slot, then to the whole set.
/// Requests for the pool's base model pass through untouched.
#[derive(Debug, Default)]
pub struct AdapterAffinityFilter;

impl AdapterAffinityFilter {
    pub fn new() -> Self {
        Self
    }
}

impl FilterPolicy for AdapterAffinityFilter {
    fn name(&self) -> &'static str {
        "adapter_affinity"
    }

    fn filter(
        &self,
        request: &LlmRequest,
        candidates: &[BackendSnapshot],
    ) -> Vec<BackendSnapshot> {
        if !request.targets_adapter() {
            return candidates.to_vec();
        }

        let adapter = request.resolved_target_model.as_str();

        let affinity: Vec<BackendSnapshot> = candidates
            .iter()
            .filter(|c| c.metrics.has_adapter(adapter))
            .cloned()
            .collect();
        if !affinity.is_empty() {
            return affinity;
        }

        let can_load: Vec<BackendSnapshot> = candidates
            .iter()
            .filter(|c| c.metrics.has_adapter_room())
            .cloned()
            .collect();
        if !can_load.is_empty() {
            return can_load;
        }

        candidates.to_vec()
    }
}
