//! Line-buffered server-sent-events parsing shared by the streaming adapters

use anyhow::{Result, anyhow};
use futures::StreamExt;
use serde_json::Value;

use super::types::TextStream;

/// Extracts the text fragment carried by one SSE `data:` payload, or `None`
/// for payloads without text (role deltas, keep-alives, stop chunks).
pub(crate) type TextExtractor = fn(&Value) -> Option<String>;

/// Turn a streaming HTTP response into a [`TextStream`] of text fragments.
///
/// SSE events may be split across network chunks, so a carry-over byte
/// buffer accumulates until complete lines are available. UTF-8 decoding
/// happens per complete line — a multi-byte sequence can never straddle
/// `\n`, so characters split across chunks stay intact.
pub(crate) fn sse_text_stream(response: reqwest::Response, extract: TextExtractor) -> TextStream {
    let mut buf: Vec<u8> = Vec::new();
    let stream = response
        .bytes_stream()
        .map(move |chunk| match chunk {
            Ok(bytes) => {
                buf.extend_from_slice(&bytes);
                drain_events(&mut buf, extract)
            }
            Err(e) => vec![Err(anyhow!("stream read failed: {}", e))],
        })
        .flat_map(futures::stream::iter);
    Box::pin(stream)
}

/// Consume complete lines from `buf`, yielding one item per `data:` payload
/// that carries text. A trailing partial line stays in the buffer.
pub(crate) fn drain_events(buf: &mut Vec<u8>, extract: TextExtractor) -> Vec<Result<String>> {
    let mut out = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line_bytes: Vec<u8> = buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line_bytes);
        let line = line.trim();

        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(payload) {
            if let Some(text) = extract(&value) {
                out.push(Ok(text));
            }
        }
    }
    out
}
