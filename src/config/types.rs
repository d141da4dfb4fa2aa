use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main router configuration
///
/// Every threshold the filter chain and request pipeline consult lives here;
/// the defaults are the routing contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Name of the inference pool this router schedules for
    pub pool_name: String,
    /// Response header carrying the chosen backend address
    pub target_pod_header: String,
    /// Maximum age for a backend metrics entry to be considered (seconds)
    pub metric_staleness_secs: u64,
    /// KV-cache pressure filter threshold
    pub kv_cache_ceiling: f64,
    /// Relaxed KV-cache threshold used when the strict one empties the set
    pub kv_cache_relaxed: f64,
    /// Queue-pressure filter margin over the candidate p90
    pub queue_margin: u32,
    /// KV-cache saturation above which sheddable requests are shed
    pub sheddable_saturation: f64,
    /// Waiting-queue depth above which a backend counts as saturated
    pub sheddable_queue_depth: u32,
    /// Least-loaded scoring weights
    pub score_weights: ScoreWeights,
    /// Cap on the buffered request body in bytes
    pub body_max_bytes: usize,
    /// Soft timeout between request headers and request body (seconds)
    pub body_timeout_secs: u64,
    /// Metrics exporter configuration (None = no exporter)
    pub metrics: Option<MetricsConfig>,
    /// Log directory (None = stdout only)
    pub log_dir: Option<String>,
    /// Log level (None = info)
    pub log_level: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pool_name: "default".to_string(),
            target_pod_header: "target-pod".to_string(),
            metric_staleness_secs: 5,
            kv_cache_ceiling: 0.85,
            kv_cache_relaxed: 0.95,
            queue_margin: 50,
            sheddable_saturation: 0.95,
            sheddable_queue_depth: 128,
            score_weights: ScoreWeights::default(),
            body_max_bytes: 1024 * 1024,
            body_timeout_secs: 30,
            metrics: None,
            log_dir: None,
            log_level: None,
        }
    }
}

impl RouterConfig {
    pub fn metric_staleness(&self) -> Duration {
        Duration::from_secs(self.metric_staleness_secs)
    }

    pub fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.body_timeout_secs)
    }

    /// Validate this configuration
    pub fn validate(&self) -> super::ConfigResult<()> {
        super::ConfigValidator::validate(self)
    }
}

/// Weights for the least-loaded backend score
///
/// `queue * waiting_queue_size + kv * kv_cache_usage + active * active_requests`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub queue: f64,
    pub kv: f64,
    pub active: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            queue: 1.0,
            kv: 10.0,
            active: 0.5,
        }
    }
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}
