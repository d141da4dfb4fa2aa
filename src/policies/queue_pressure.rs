//! Queue pressure filter

use super::FilterPolicy;
use crate::core::BackendSnapshot;
use crate::scheduler::LlmRequest;

/// Drops backends whose waiting queue is far above the candidate p90
///
/// Keeps the scheduler from herding requests onto replicas that are already
/// saturated relative to their peers. The p90 backend itself always
/// survives, so this filter never empties a non-empty set.
#[derive(Debug)]
pub struct QueuePressureFilter {
    margin: u32,
}

impl QueuePressureFilter {
    pub fn new(margin: u32) -> Self {
        Self { margin }
    }

    fn p90(candidates: &[BackendSnapshot]) -> u32 {
        let mut queues: Vec<u32> = candidates
            .iter()
            .map(|c| c.metrics.waiting_queue_size)
            .collect();
        queues.sort_unstable();
        queues[(queues.len() - 1) * 9 / 10]
    }
}

impl FilterPolicy for QueuePressureFilter {
    fn name(&self) -> &'static str {
        "queue_pressure"
    }

    fn filter(
        &self,
        _request: &LlmRequest,
        candidates: &[BackendSnapshot],
    ) -> Vec<BackendSnapshot> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let ceiling = Self::p90(candidates).saturating_add(self.margin);
        candidates
            .iter()
            .filter(|c| c.metrics.waiting_queue_size <= ceiling)
            .cloned()
            .collect()
    }
}
