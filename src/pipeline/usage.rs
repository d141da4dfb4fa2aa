//! Token usage extraction from response bodies
//!
//! Backends report usage either in a unary JSON response or, for streamed
//! completions, in a terminal SSE frame. Absence is tolerated; accounting
//! degrades to size-only observations.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Deserialize)]
struct ResponseBody {
    usage: Option<Usage>,
}

/// Extract usage from a complete unary JSON response body
pub fn from_unary_body(body: &[u8]) -> Option<Usage> {
    serde_json::from_slice::<ResponseBody>(body)
        .ok()
        .and_then(|r| r.usage)
}

/// Scan one SSE chunk for the last frame carrying usage
///
/// Frames look like `data: {json}`; the terminal `data: [DONE]` marker and
/// frames without usage are skipped. Chunks are scanned independently so
/// streamed responses never accumulate.
pub fn from_sse_chunk(chunk: &[u8]) -> Option<Usage> {
    let text = std::str::from_utf8(chunk).ok()?;
    let mut last = None;
    for line in text.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        if let Some(usage) = from_unary_body(data.as_bytes()) {
            last = Some(usage);
        }
    }
    last
}
