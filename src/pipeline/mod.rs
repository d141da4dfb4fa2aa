//! Per-request processing pipeline
//!
//! Drives the phases of one proxied HTTP request as a state machine over
//! the envelope stream: parse headers and body, resolve the target model,
//! schedule a backend, rewrite the routing header, then watch the response
//! stream for accounting. Each stream owns its own `RequestContext`;
//! parallelism is across streams.

pub mod envelope;
pub mod usage;

pub use envelope::{
    ChannelStream, EnvelopeStream, HeaderMutation, ProcessingRequest, ProcessingResponse,
    TransportError,
};
pub use usage::Usage;

use crate::config::RouterConfig;
use crate::core::ScheduleError;
use crate::metrics::RouterMetrics;
use crate::registry::{Criticality, ModelRegistry};
use crate::scheduler::{LlmRequest, Scheduler};
use http::StatusCode;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Phases of one request stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    AwaitRequestHeaders,
    AwaitRequestBody,
    AwaitResponseHeaders,
    AwaitResponseBody,
    Done,
    Failed,
}

/// Mutable record shared by the phases of one request
///
/// Owned exclusively by the pipeline invocation; never escapes it.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub target_backend: Option<String>,
    pub model: String,
    pub resolved_target_model: String,
    pub request_received: Option<Instant>,
    pub response_complete: Option<Instant>,
    pub request_size: usize,
    pub response_size: usize,
    pub usage: Option<Usage>,
    pub streaming_response: bool,
}

/// The per-request state machine
pub struct RequestPipeline {
    registry: Arc<ModelRegistry>,
    scheduler: Arc<Scheduler>,
    config: Arc<RouterConfig>,
}

impl RequestPipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        scheduler: Arc<Scheduler>,
        config: Arc<RouterConfig>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            config,
        }
    }

    /// Drive one stream to completion
    ///
    /// All request-level failures are answered with an immediate response
    /// and never propagate past this call; the returned phase is `Done` for
    /// a fully accounted request.
    pub async fn process<S: EnvelopeStream>(&self, stream: &mut S) -> PipelinePhase {
        let mut ctx = RequestContext::default();
        let mut phase = PipelinePhase::AwaitRequestHeaders;
        let mut request_body: Vec<u8> = Vec::new();
        let mut response_body: Vec<u8> = Vec::new();
        let mut response_overflow = false;

        loop {
            // The headers-to-body gap is the only phase with a deadline;
            // response streaming is unbounded.
            let envelope = if phase == PipelinePhase::AwaitRequestBody {
                match timeout(self.config.body_timeout(), stream.recv()).await {
                    Ok(envelope) => envelope,
                    Err(_) => {
                        warn!("timed out waiting for request body");
                        self.reply(stream, ProcessingResponse::immediate(StatusCode::REQUEST_TIMEOUT))
                            .await;
                        return PipelinePhase::Failed;
                    }
                }
            } else {
                stream.recv().await
            };

            let envelope = match envelope {
                Some(Ok(envelope)) => envelope,
                Some(Err(e)) => {
                    error!("cannot receive stream envelope: {}", e);
                    return PipelinePhase::Failed;
                }
                // Gateway closed the stream (or the client cancelled)
                None => return phase,
            };

            let response = match (phase, envelope) {
                (
                    PipelinePhase::AwaitRequestHeaders,
                    ProcessingRequest::RequestHeaders { .. },
                ) => {
                    ctx.request_received = Some(Instant::now());
                    phase = PipelinePhase::AwaitRequestBody;
                    ProcessingResponse::passthrough()
                }
                (
                    PipelinePhase::AwaitRequestBody,
                    ProcessingRequest::RequestBody {
                        body,
                        end_of_stream,
                    },
                ) => {
                    if request_body.len() + body.len() > self.config.body_max_bytes {
                        warn!(
                            limit = self.config.body_max_bytes,
                            "request body exceeds buffer cap"
                        );
                        self.reply(
                            stream,
                            ProcessingResponse::immediate(StatusCode::PAYLOAD_TOO_LARGE),
                        )
                        .await;
                        return PipelinePhase::Failed;
                    }
                    request_body.extend_from_slice(&body);

                    if !end_of_stream {
                        ProcessingResponse::passthrough()
                    } else {
                        let response = self.handle_request_body(&mut ctx, &request_body);
                        match response {
                            ProcessingResponse::Common { .. } => {
                                RouterMetrics::record_request(
                                    &ctx.model,
                                    &ctx.resolved_target_model,
                                );
                                RouterMetrics::record_request_size(
                                    &ctx.model,
                                    &ctx.resolved_target_model,
                                    ctx.request_size,
                                );
                                phase = PipelinePhase::AwaitResponseHeaders;
                            }
                            ProcessingResponse::Immediate { .. } => {
                                self.reply(stream, response).await;
                                return PipelinePhase::Failed;
                            }
                        }
                        response
                    }
                }
                (
                    PipelinePhase::AwaitResponseHeaders,
                    ProcessingRequest::ResponseHeaders { headers },
                ) => {
                    ctx.streaming_response = headers.iter().any(|(name, value)| {
                        name.eq_ignore_ascii_case("content-type")
                            && value.to_ascii_lowercase().contains("text/event-stream")
                    });
                    phase = PipelinePhase::AwaitResponseBody;
                    ProcessingResponse::passthrough()
                }
                (
                    PipelinePhase::AwaitResponseBody,
                    ProcessingRequest::ResponseBody {
                        body,
                        end_of_stream,
                    },
                ) => {
                    ctx.response_size += body.len();
                    if ctx.streaming_response {
                        // Only the latest usage frame matters; chunks are
                        // never accumulated.
                        if let Some(usage) = usage::from_sse_chunk(&body) {
                            ctx.usage = Some(usage);
                        }
                    } else if !response_overflow {
                        if response_body.len() + body.len() > self.config.body_max_bytes {
                            response_overflow = true;
                            response_body.clear();
                        } else {
                            response_body.extend_from_slice(&body);
                        }
                    }

                    if end_of_stream {
                        ctx.response_complete = Some(Instant::now());
                        if !ctx.streaming_response && !response_overflow {
                            ctx.usage = usage::from_unary_body(&response_body);
                        }
                        self.record_completion(&ctx);
                        phase = PipelinePhase::Done;
                    }
                    ProcessingResponse::passthrough()
                }
                (_, envelope) => {
                    error!(?phase, ?envelope, "envelope does not match stream phase");
                    self.reply(
                        stream,
                        ProcessingResponse::immediate(StatusCode::INTERNAL_SERVER_ERROR),
                    )
                    .await;
                    return PipelinePhase::Failed;
                }
            };

            if stream.send(response).await.is_err() {
                error!("failed to send response to gateway");
                return PipelinePhase::Failed;
            }

            if phase == PipelinePhase::Done {
                return phase;
            }
        }
    }

    /// Parse the body, resolve the model and schedule a backend
    fn handle_request_body(
        &self,
        ctx: &mut RequestContext,
        body: &[u8],
    ) -> ProcessingResponse {
        ctx.request_size = body.len();

        let mut parsed: serde_json::Value = match serde_json::from_slice(body) {
            Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
            _ => {
                warn!("request body is not a JSON object");
                return ProcessingResponse::immediate(StatusCode::BAD_REQUEST);
            }
        };

        let Some(alias) = parsed.get("model").and_then(|m| m.as_str()).map(String::from)
        else {
            warn!("request body is missing the model field");
            return ProcessingResponse::immediate(StatusCode::BAD_REQUEST);
        };
        ctx.model = alias.clone();

        let mut criticality = Criticality::default();
        let mut resolved = alias.clone();
        match self.registry.resolve(&self.config.pool_name, &alias) {
            // A model whose traffic split has no valid target is handled
            // exactly like an unregistered alias, default criticality
            // included.
            Some(model) => match self.registry.pick_target(&model) {
                Some(target) => {
                    criticality = model.criticality;
                    resolved = target;
                }
                None => {
                    debug!(model = %alias, "no valid traffic-split target, passing alias through");
                }
            },
            None => {
                debug!(model = %alias, "no inference model for alias, passing through");
            }
        }
        ctx.resolved_target_model = resolved.clone();

        let mutated_body = if resolved != alias {
            parsed["model"] = serde_json::Value::String(resolved.clone());
            match serde_json::to_vec(&parsed) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    error!("failed to serialize rewritten body: {}", e);
                    return ProcessingResponse::immediate(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        } else {
            None
        };

        let request = LlmRequest {
            model: alias,
            resolved_target_model: resolved,
            criticality,
            request_id: rand::rng().random(),
        };

        match self.scheduler.schedule(&request) {
            Ok(backend) => {
                ctx.target_backend = Some(backend.address().to_string());
                let mut header_mutation = HeaderMutation::default()
                    .set_header(&self.config.target_pod_header, backend.address());
                if let Some(body) = &mutated_body {
                    header_mutation =
                        header_mutation.set_header("content-length", body.len().to_string());
                }
                ProcessingResponse::Common {
                    header_mutation,
                    body: mutated_body,
                }
            }
            Err(ScheduleError::Shed) => {
                ProcessingResponse::immediate(StatusCode::TOO_MANY_REQUESTS)
            }
            Err(ScheduleError::NoBackends) => {
                ProcessingResponse::immediate(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }

    /// Terminal accounting, called exactly once when the stream completes
    fn record_completion(&self, ctx: &RequestContext) {
        let (model, target) = (ctx.model.as_str(), ctx.resolved_target_model.as_str());

        if let (Some(received), Some(complete)) = (ctx.request_received, ctx.response_complete) {
            RouterMetrics::record_request_latency(model, target, received, complete);
        }
        RouterMetrics::record_response_size(model, target, ctx.response_size);

        if let Some(usage) = ctx.usage {
            RouterMetrics::record_input_tokens(model, target, usage.prompt_tokens);
            RouterMetrics::record_output_tokens(model, target, usage.completion_tokens);
        }
    }

    /// Best-effort send for terminal verdicts
    async fn reply<S: EnvelopeStream>(&self, stream: &mut S, response: ProcessingResponse) {
        if let Err(e) = stream.send(response).await {
            error!("failed to send immediate response: {}", e);
        }
    }
}
