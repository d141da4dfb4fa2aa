use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete router configuration
    pub fn validate(config: &RouterConfig) -> ConfigResult<()> {
        Self::validate_identity(config)?;
        Self::validate_thresholds(config)?;
        Self::validate_weights(&config.score_weights)?;
        Self::validate_pipeline_limits(config)?;

        if let Some(metrics) = &config.metrics {
            Self::validate_metrics(metrics)?;
        }

        Ok(())
    }

    fn validate_identity(config: &RouterConfig) -> ConfigResult<()> {
        if config.pool_name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "pool_name".to_string(),
            });
        }

        if config.target_pod_header.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "target_pod_header".to_string(),
            });
        }

        // Header names must be valid HTTP header tokens
        let valid_header = config
            .target_pod_header
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid_header {
            return Err(ConfigError::InvalidValue {
                field: "target_pod_header".to_string(),
                value: config.target_pod_header.clone(),
                reason: "Must be a valid HTTP header name".to_string(),
            });
        }

        Ok(())
    }

    fn validate_thresholds(config: &RouterConfig) -> ConfigResult<()> {
        if config.metric_staleness_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metric_staleness_secs".to_string(),
                value: config.metric_staleness_secs.to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }

        for (field, value) in [
            ("kv_cache_ceiling", config.kv_cache_ceiling),
            ("kv_cache_relaxed", config.kv_cache_relaxed),
            ("sheddable_saturation", config.sheddable_saturation),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Must be within (0.0, 1.0]".to_string(),
                });
            }
        }

        if config.kv_cache_relaxed < config.kv_cache_ceiling {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "kv_cache_relaxed ({}) must be >= kv_cache_ceiling ({})",
                    config.kv_cache_relaxed, config.kv_cache_ceiling
                ),
            });
        }

        Ok(())
    }

    fn validate_weights(weights: &ScoreWeights) -> ConfigResult<()> {
        for (field, value) in [
            ("score_weights.queue", weights.queue),
            ("score_weights.kv", weights.kv),
            ("score_weights.active", weights.active),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Must be finite and non-negative".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_pipeline_limits(config: &RouterConfig) -> ConfigResult<()> {
        if config.body_max_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "body_max_bytes".to_string(),
                value: config.body_max_bytes.to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }

        if config.body_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "body_timeout_secs".to_string(),
                value: config.body_timeout_secs.to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    fn validate_metrics(metrics: &MetricsConfig) -> ConfigResult<()> {
        if metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_string(),
                value: metrics.port.to_string(),
                reason: "Port must be between 1 and 65535".to_string(),
            });
        }
        if metrics.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "metrics.host".to_string(),
            });
        }
        Ok(())
    }
}
