use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::error;

#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    pub port: u16,
    pub host: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            host: "0.0.0.0".to_string(),
        }
    }
}

pub fn init_metrics() {
    // Per-model request metrics
    describe_counter!(
        "inference_model_request_total",
        "Counter of inference model requests broken out for each model and target model"
    );
    describe_histogram!(
        "inference_model_request_duration_seconds",
        "Inference model response latency distribution in seconds for each model and target model"
    );
    describe_histogram!(
        "inference_model_request_sizes",
        "Inference model request size distribution in bytes for each model and target model"
    );
    describe_histogram!(
        "inference_model_response_sizes",
        "Inference model response size distribution in bytes for each model and target model"
    );
    describe_histogram!(
        "inference_model_input_tokens",
        "Inference model input token count for requests in each model"
    );
    describe_histogram!(
        "inference_model_output_tokens",
        "Inference model output token count for requests in each model"
    );

    // Router operational metrics
    describe_gauge!("router_backends", "Number of backends known to the store");
    describe_counter!(
        "router_policy_decisions_total",
        "Total scheduling decisions by backend address"
    );
    describe_counter!(
        "router_sheds_total",
        "Total sheddable requests rejected due to cluster saturation"
    );
    describe_counter!(
        "router_kv_pressure_relaxed_total",
        "Times the KV-cache pressure filter fell back to the relaxed threshold"
    );
    describe_counter!(
        "router_model_conflicts_total",
        "Conflicting inference model registrations by pool and alias"
    );
}

pub fn start_prometheus(config: PrometheusConfig) {
    init_metrics();

    let duration_matcher = Matcher::Suffix(String::from("duration_seconds"));
    let duration_buckets = [
        0.005, 0.025, 0.05, 0.1, 0.2, 0.4, 0.6, 0.8, 1.0, 1.25, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0,
        10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 120.0, 180.0, 240.0, 300.0, 360.0, 480.0, 600.0,
        900.0, 1200.0, 1800.0, 2700.0, 3600.0,
    ];

    let size_matcher = Matcher::Suffix(String::from("_sizes"));
    let size_buckets = [
        64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0, 32768.0, 65536.0,
        131072.0, 262144.0, 524288.0, 1048576.0, 2097152.0, 4194304.0, 8388608.0,
    ];

    let token_matcher = Matcher::Suffix(String::from("_tokens"));
    let token_buckets = [
        1.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0,
        32768.0, 65536.0, 131072.0, 262144.0, 524288.0, 1048576.0,
    ];

    let ip_addr: IpAddr = config
        .host
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
    let socket_addr = SocketAddr::new(ip_addr, config.port);

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .upkeep_timeout(Duration::from_secs(5 * 60))
        .set_buckets_for_metric(duration_matcher, &duration_buckets)
        .expect("failed to set duration buckets")
        .set_buckets_for_metric(size_matcher, &size_buckets)
        .expect("failed to set size buckets")
        .set_buckets_for_metric(token_matcher, &token_buckets)
        .expect("failed to set token buckets")
        .install()
        .expect("failed to install Prometheus metrics exporter");
}

pub struct RouterMetrics;

impl RouterMetrics {
    // Per-model request metrics, labeled (model_name, target_model_name)
    pub fn record_request(model: &str, target_model: &str) {
        counter!("inference_model_request_total",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .increment(1);
    }

    /// Record end-to-end request latency
    ///
    /// The observation is suppressed when `complete` is not after `received`;
    /// a latency of zero or less means one of the timestamps is wrong.
    pub fn record_request_latency(
        model: &str,
        target_model: &str,
        received: Instant,
        complete: Instant,
    ) -> bool {
        if complete <= received {
            error!(
                "request latency value error for model {}, target model {}: complete is not after received",
                model, target_model
            );
            return false;
        }
        histogram!("inference_model_request_duration_seconds",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .record((complete - received).as_secs_f64());
        true
    }

    pub fn record_request_size(model: &str, target_model: &str, size: usize) {
        histogram!("inference_model_request_sizes",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .record(size as f64);
    }

    pub fn record_response_size(model: &str, target_model: &str, size: usize) {
        histogram!("inference_model_response_sizes",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .record(size as f64);
    }

    pub fn record_input_tokens(model: &str, target_model: &str, tokens: u64) {
        histogram!("inference_model_input_tokens",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .record(tokens as f64);
    }

    pub fn record_output_tokens(model: &str, target_model: &str, tokens: u64) {
        histogram!("inference_model_output_tokens",
            "model_name" => model.to_string(),
            "target_model_name" => target_model.to_string()
        )
        .record(tokens as f64);
    }

    // Router operational metrics
    pub fn set_backend_count(count: usize) {
        gauge!("router_backends").set(count as f64);
    }

    pub fn record_policy_decision(backend: &str) {
        counter!("router_policy_decisions_total",
            "backend" => backend.to_string()
        )
        .increment(1);
    }

    pub fn record_shed() {
        counter!("router_sheds_total").increment(1);
    }

    pub fn record_kv_pressure_relaxed() {
        counter!("router_kv_pressure_relaxed_total").increment(1);
    }

    pub fn record_model_conflict(pool: &str, alias: &str) {
        counter!("router_model_conflicts_total",
            "pool" => pool.to_string(),
            "model_name" => alias.to_string()
        )
        .increment(1);
    }
}
