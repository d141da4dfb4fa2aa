pub mod model;

pub use model::{Criticality, InferenceModel, InferencePool, ModelId, TargetModel};

use crate::metrics::RouterMetrics;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key scoping a model alias to its pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AliasKey {
    pool: String,
    alias: String,
}

/// Projection of the declarative model and pool resources
///
/// For a given `(pool, modelName)` exactly one InferenceModel is active;
/// conflicts resolve by creation timestamp, older wins. Losers are retained
/// inactive so a late delete of the winner reactivates them.
#[derive(Default)]
pub struct ModelRegistry {
    by_alias: DashMap<AliasKey, Vec<Arc<InferenceModel>>>,
    by_id: DashMap<ModelId, AliasKey>,
    pools: DashMap<String, Arc<InferencePool>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a model by its resource identity
    pub fn upsert(&self, model: InferenceModel) {
        let model = Arc::new(model);
        let key = AliasKey {
            pool: model.pool_ref.clone(),
            alias: model.model_name.clone(),
        };

        // A re-registration under a different alias or pool moves the entry
        if let Some((_, old_key)) = self.by_id.remove(&model.id) {
            self.detach(&old_key, &model.id);
        }
        self.by_id.insert(model.id.clone(), key.clone());

        let mut entries = self.by_alias.entry(key.clone()).or_default();
        entries.push(model.clone());
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        if entries.len() > 1 {
            warn!(
                "{} inference models declare {}/{}; {} wins by creation timestamp",
                entries.len(),
                key.pool,
                key.alias,
                entries[0].id
            );
            RouterMetrics::record_model_conflict(&key.pool, &key.alias);
        }
    }

    /// Remove a model by its resource identity
    pub fn remove(&self, id: &ModelId) -> bool {
        match self.by_id.remove(id) {
            Some((_, key)) => {
                self.detach(&key, id);
                true
            }
            None => false,
        }
    }

    fn detach(&self, key: &AliasKey, id: &ModelId) {
        if let Some(mut entries) = self.by_alias.get_mut(key) {
            entries.retain(|m| &m.id != id);
        }
        self.by_alias.remove_if(key, |_, entries| entries.is_empty());
    }

    /// Resolve an alias to the active model for a pool
    pub fn resolve(&self, pool: &str, alias: &str) -> Option<Arc<InferenceModel>> {
        let key = AliasKey {
            pool: pool.to_string(),
            alias: alias.to_string(),
        };
        let resolved = self
            .by_alias
            .get(&key)
            .and_then(|entries| entries.first().cloned());
        if resolved.is_none() {
            debug!("no inference model registered for {}/{}", pool, alias);
        }
        resolved
    }

    /// Pick a concrete target model by weighted selection
    ///
    /// A single target is returned deterministically. Over many draws the
    /// empirical distribution converges to the declared weights; unspecified
    /// weights count as one share. All-zero weights have no valid target.
    pub fn pick_target(&self, model: &InferenceModel) -> Option<String> {
        self.pick_target_with(model, &mut rand::rng())
    }

    /// `pick_target` with a caller-supplied randomness source
    pub fn pick_target_with<R: Rng>(&self, model: &InferenceModel, rng: &mut R) -> Option<String> {
        let targets = &model.target_models;
        match targets.len() {
            0 => None,
            1 => {
                if targets[0].weight == Some(0) {
                    return None;
                }
                Some(targets[0].name.clone())
            }
            _ => {
                let weights: Vec<u32> = targets.iter().map(|t| t.weight.unwrap_or(1)).collect();
                let index = WeightedIndex::new(&weights).ok()?;
                Some(targets[index.sample(rng)].name.clone())
            }
        }
    }

    pub fn upsert_pool(&self, pool: InferencePool) {
        self.pools.insert(pool.name.clone(), Arc::new(pool));
    }

    pub fn get_pool(&self, name: &str) -> Option<Arc<InferencePool>> {
        self.pools.get(name).map(|entry| entry.clone())
    }

    pub fn remove_pool(&self, name: &str) -> bool {
        self.pools.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Helper for constructing models in reconcilers and tests
pub fn model_created_at(secs_ago: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(secs_ago)
}
