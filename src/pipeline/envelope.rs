//! Typed envelopes of the external-processing stream
//!
//! The wire transport lives outside this crate; whatever carries the
//! bidirectional stream implements `EnvelopeStream` and the pipeline drives
//! it. `ChannelStream` is the in-process transport used for embedding and
//! tests.

use async_trait::async_trait;
use http::StatusCode;
use std::fmt;
use tokio::sync::mpsc;

/// One phase of the proxied HTTP request, as seen by the gateway
#[derive(Debug, Clone)]
pub enum ProcessingRequest {
    RequestHeaders {
        headers: Vec<(String, String)>,
    },
    RequestBody {
        body: Vec<u8>,
        end_of_stream: bool,
    },
    ResponseHeaders {
        headers: Vec<(String, String)>,
    },
    ResponseBody {
        body: Vec<u8>,
        end_of_stream: bool,
    },
}

/// Headers to set or overwrite on the proxied request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMutation {
    pub set: Vec<(String, String)>,
}

impl HeaderMutation {
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.set
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Verdict for one phase of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResponse {
    /// Let the phase through, optionally mutating headers and body
    Common {
        header_mutation: HeaderMutation,
        body: Option<Vec<u8>>,
    },
    /// Short-circuit the request with an HTTP status
    Immediate { status: StatusCode },
}

impl ProcessingResponse {
    /// Pass-through response with no mutations
    pub fn passthrough() -> Self {
        ProcessingResponse::Common {
            header_mutation: HeaderMutation::default(),
            body: None,
        }
    }

    pub fn immediate(status: StatusCode) -> Self {
        ProcessingResponse::Immediate { status }
    }
}

/// Transport-level failure of the stream
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Bidirectional stream of envelopes for one HTTP request
///
/// `recv` returning `None` means the gateway closed the stream.
#[async_trait]
pub trait EnvelopeStream: Send {
    async fn recv(&mut self) -> Option<Result<ProcessingRequest, TransportError>>;
    async fn send(&mut self, response: ProcessingResponse) -> Result<(), TransportError>;
}

/// In-process transport over tokio channels
pub struct ChannelStream {
    rx: mpsc::Receiver<ProcessingRequest>,
    tx: mpsc::Sender<ProcessingResponse>,
}

impl ChannelStream {
    /// Returns the stream plus the far ends the caller drives
    pub fn pair(
        buffer: usize,
    ) -> (
        Self,
        mpsc::Sender<ProcessingRequest>,
        mpsc::Receiver<ProcessingResponse>,
    ) {
        let (req_tx, req_rx) = mpsc::channel(buffer);
        let (resp_tx, resp_rx) = mpsc::channel(buffer);
        (
            Self {
                rx: req_rx,
                tx: resp_tx,
            },
            req_tx,
            resp_rx,
        )
    }
}

#[async_trait]
impl EnvelopeStream for ChannelStream {
    async fn recv(&mut self) -> Option<Result<ProcessingRequest, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn send(&mut self, response: ProcessingResponse) -> Result<(), TransportError> {
        self.tx
            .send(response)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}
