//! Declarative model and pool resource types
//!
//! These mirror the control-plane objects the registry projects; the
//! reconcilers that watch the cluster API feed them in through `upsert`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Resource identity of an InferenceModel object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelId {
    pub namespace: String,
    pub name: String,
}

impl ModelId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Shedding eligibility tier for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Criticality {
    Critical,
    #[default]
    Standard,
    Sheddable,
}

/// One concrete target of a traffic split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetModel {
    pub name: String,
    /// Non-negative share; unspecified counts as one share
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

/// Routing policy for a user-visible model alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceModel {
    pub id: ModelId,
    /// User-visible alias carried in request bodies
    pub model_name: String,
    #[serde(default)]
    pub criticality: Criticality,
    /// Name of the InferencePool the model is scoped to
    pub pool_ref: String,
    pub target_models: Vec<TargetModel>,
    pub created_at: DateTime<Utc>,
}

/// Selector-defined group of backends managed under one routing policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferencePool {
    pub name: String,
    /// Flat label map, AND semantics
    pub selector: HashMap<String, String>,
    pub target_port: u16,
}

impl InferencePool {
    /// Whether a backend's labels satisfy the pool selector
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.selector
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}
