//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use inference_router::config::RouterConfig;
use inference_router::core::{Backend, BackendId, BackendMetrics, BackendStore};
use inference_router::pipeline::{
    ChannelStream, PipelinePhase, ProcessingRequest, ProcessingResponse, RequestPipeline,
};
use inference_router::registry::{
    Criticality, InferenceModel, ModelId, ModelRegistry, TargetModel,
};
use inference_router::scheduler::Scheduler;
use std::collections::HashSet;
use std::sync::Arc;

pub fn backend(name: &str, address: &str) -> Backend {
    Backend::new(BackendId::new("default", name), address)
}

pub fn metrics(kv: f64, queue: u32) -> BackendMetrics {
    BackendMetrics {
        kv_cache_usage: kv,
        waiting_queue_size: queue,
        max_active_adapters: 4,
        ..Default::default()
    }
}

pub fn metrics_with_adapters(kv: f64, queue: u32, adapters: &[&str]) -> BackendMetrics {
    BackendMetrics {
        active_adapters: adapters.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        ..metrics(kv, queue)
    }
}

pub fn inference_model(
    name: &str,
    alias: &str,
    criticality: Criticality,
    targets: Vec<(&str, Option<u32>)>,
    created_secs_ago: i64,
) -> InferenceModel {
    InferenceModel {
        id: ModelId::new("default", name),
        model_name: alias.to_string(),
        criticality,
        pool_ref: "default".to_string(),
        target_models: targets
            .into_iter()
            .map(|(name, weight)| TargetModel {
                name: name.to_string(),
                weight,
            })
            .collect(),
        created_at: Utc::now() - ChronoDuration::seconds(created_secs_ago),
    }
}

pub struct TestRouter {
    pub store: Arc<BackendStore>,
    pub registry: Arc<ModelRegistry>,
    pub pipeline: Arc<RequestPipeline>,
}

pub fn test_router(config: RouterConfig) -> TestRouter {
    let config = Arc::new(config);
    let store = Arc::new(BackendStore::new());
    let registry = Arc::new(ModelRegistry::new());
    let scheduler = Arc::new(Scheduler::new(store.clone(), &config));
    let pipeline = Arc::new(RequestPipeline::new(
        registry.clone(),
        scheduler,
        config.clone(),
    ));
    TestRouter {
        store,
        registry,
        pipeline,
    }
}

/// Feed a fixed sequence of envelopes through a fresh stream and collect
/// every response the pipeline emitted.
pub async fn run_stream(
    pipeline: Arc<RequestPipeline>,
    envelopes: Vec<ProcessingRequest>,
) -> (PipelinePhase, Vec<ProcessingResponse>) {
    let (mut stream, req_tx, mut resp_rx) = ChannelStream::pair(32);
    let handle = tokio::spawn(async move { pipeline.process(&mut stream).await });

    for envelope in envelopes {
        if req_tx.send(envelope).await.is_err() {
            break; // pipeline terminated early with an immediate response
        }
    }
    drop(req_tx);

    let phase = handle.await.expect("pipeline task panicked");
    let mut responses = Vec::new();
    while let Some(response) = resp_rx.recv().await {
        responses.push(response);
    }
    (phase, responses)
}

pub fn request_headers() -> ProcessingRequest {
    ProcessingRequest::RequestHeaders {
        headers: vec![(":method".to_string(), "POST".to_string())],
    }
}

pub fn request_body(body: &[u8]) -> ProcessingRequest {
    ProcessingRequest::RequestBody {
        body: body.to_vec(),
        end_of_stream: true,
    }
}

pub fn response_headers(content_type: &str) -> ProcessingRequest {
    ProcessingRequest::ResponseHeaders {
        headers: vec![("content-type".to_string(), content_type.to_string())],
    }
}

pub fn response_body(body: &[u8], end_of_stream: bool) -> ProcessingRequest {
    ProcessingRequest::ResponseBody {
        body: body.to_vec(),
        end_of_stream,
    }
}
