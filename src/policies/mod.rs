//! Filter policies for backend selection
//!
//! A filter narrows a candidate set of backend snapshots for one request.
//! Filters compose into a decision tree: a node whose filter yields a
//! non-empty set descends `on_match` with that set, an empty yield descends
//! `on_miss` with the node's input, and a leaf returns its yield.

use crate::core::BackendSnapshot;
use crate::scheduler::LlmRequest;
use std::fmt::Debug;

mod adapter_affinity;
mod criticality;
mod kv_pressure;
mod least_loaded;
mod queue_pressure;

pub use adapter_affinity::AdapterAffinityFilter;
pub use criticality::CriticalityGate;
pub use kv_pressure::KvPressureFilter;
pub use least_loaded::LeastLoadedFilter;
pub use queue_pressure::QueuePressureFilter;

/// Core trait for candidate-narrowing filters
pub trait FilterPolicy: Send + Sync + Debug {
    /// Filter name for logging and debugging
    fn name(&self) -> &'static str;

    /// Narrow the candidate set for this request
    ///
    /// Returning an empty set signals the filter found no acceptable
    /// backend; the decision tree decides whether that is terminal.
    fn filter(&self, request: &LlmRequest, candidates: &[BackendSnapshot])
        -> Vec<BackendSnapshot>;
}

/// One node of the filter decision tree
#[derive(Debug)]
pub struct DecisionNode {
    filter: Box<dyn FilterPolicy>,
    on_match: Option<Box<DecisionNode>>,
    on_miss: Option<Box<DecisionNode>>,
}

impl DecisionNode {
    pub fn new(
        filter: Box<dyn FilterPolicy>,
        on_match: Option<Box<DecisionNode>>,
        on_miss: Option<Box<DecisionNode>>,
    ) -> Self {
        Self {
            filter,
            on_match,
            on_miss,
        }
    }

    /// Terminal node: its filter output is the final candidate subset
    pub fn leaf(filter: Box<dyn FilterPolicy>) -> Self {
        Self::new(filter, None, None)
    }

    /// Chain of filters where each non-empty output feeds the next
    ///
    /// Panics if `filters` is empty; the canonical tree always has a leaf.
    pub fn chain(filters: Vec<Box<dyn FilterPolicy>>) -> Self {
        let mut node = None;
        for filter in filters.into_iter().rev() {
            node = Some(DecisionNode::new(filter, node.map(Box::new), None));
        }
        node.expect("filter chain must not be empty")
    }

    /// Evaluate root-to-leaf, following the branch the yield selects
    pub fn evaluate(
        &self,
        request: &LlmRequest,
        candidates: &[BackendSnapshot],
    ) -> Vec<BackendSnapshot> {
        let output = self.filter.filter(request, candidates);
        tracing::debug!(
            filter = self.filter.name(),
            input = candidates.len(),
            output = output.len(),
            "filter evaluated"
        );
        if !output.is_empty() {
            match &self.on_match {
                Some(next) => next.evaluate(request, &output),
                None => output,
            }
        } else {
            match &self.on_miss {
                Some(next) => next.evaluate(request, candidates),
                None => output,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::{Backend, BackendId, BackendMetrics, BackendSnapshot};
    use crate::registry::Criticality;
    use crate::scheduler::LlmRequest;
    use std::sync::Arc;

    pub fn snapshot(name: &str, address: &str, metrics: BackendMetrics) -> BackendSnapshot {
        BackendSnapshot {
            backend: Arc::new(Backend::new(BackendId::new("default", name), address)),
            metrics: Arc::new(metrics),
        }
    }

    pub fn request(model: &str, resolved: &str, criticality: Criticality) -> LlmRequest {
        LlmRequest {
            model: model.to_string(),
            resolved_target_model: resolved.to_string(),
            criticality,
            request_id: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::core::BackendMetrics;
    use crate::registry::Criticality;

    #[derive(Debug)]
    struct DropAll;

    impl FilterPolicy for DropAll {
        fn name(&self) -> &'static str {
            "drop_all"
        }
        fn filter(&self, _: &LlmRequest, _: &[BackendSnapshot]) -> Vec<BackendSnapshot> {
            Vec::new()
        }
    }

    #[derive(Debug)]
    struct KeepAll;

    impl FilterPolicy for KeepAll {
        fn name(&self) -> &'static str {
            "keep_all"
        }
        fn filter(
            &self,
            _: &LlmRequest,
            candidates: &[BackendSnapshot],
        ) -> Vec<BackendSnapshot> {
            candidates.to_vec()
        }
    }

    #[test]
    fn test_on_miss_receives_node_input() {
        let tree = DecisionNode::new(
            Box::new(DropAll),
            None,
            Some(Box::new(DecisionNode::leaf(Box::new(KeepAll)))),
        );
        let candidates = vec![snapshot("b0", "10.0.0.1:8000", BackendMetrics::default())];
        let req = request("m", "m", Criticality::Standard);

        let out = tree.evaluate(&req, &candidates);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_empty_leaf_yield_is_terminal() {
        let tree = DecisionNode::leaf(Box::new(DropAll));
        let candidates = vec![snapshot("b0", "10.0.0.1:8000", BackendMetrics::default())];
        let req = request("m", "m", Criticality::Standard);

        assert!(tree.evaluate(&req, &candidates).is_empty());
    }

    #[test]
    fn test_chain_feeds_outputs_forward() {
        let tree = DecisionNode::chain(vec![Box::new(KeepAll), Box::new(KeepAll)]);
        let candidates = vec![
            snapshot("b0", "10.0.0.1:8000", BackendMetrics::default()),
            snapshot("b1", "10.0.0.2:8000", BackendMetrics::default()),
        ];
        let req = request("m", "m", Criticality::Standard);

        assert_eq!(tree.evaluate(&req, &candidates).len(), 2);
    }
}
