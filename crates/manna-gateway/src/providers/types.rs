//! Provider-agnostic types for multi-vendor text generation

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Lazily-produced sequence of text fragments from a streaming provider
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A completed one-shot generation, tagged with the provider that served it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub provider: String,
}

/// An open text stream, tagged with the provider that served it
pub struct StreamHandle {
    pub stream: TextStream,
    pub provider: String,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Trait that all vendor adapters implement.
///
/// Adapters are stateless and re-entrant: a single instance may serve many
/// concurrent requests. One-shot generation is required; streaming and
/// transcription are optional capabilities gated by the `supports_*` checks.
/// Each adapter owns its own per-call timeout.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Display name, unique within a manager (e.g. "Gemini", "Groq")
    fn name(&self) -> &str;

    /// Issue a single completion request and return the extracted text
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Whether [`generate_stream`](Self::generate_stream) is implemented
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Open a streaming completion. Only call when
    /// [`supports_streaming`](Self::supports_streaming) is true.
    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
        Err(anyhow!("{} does not support streaming", self.name()))
    }

    /// Whether [`transcribe`](Self::transcribe) is implemented
    fn supports_transcription(&self) -> bool {
        false
    }

    /// Transcribe raw audio bytes to text
    async fn transcribe(&self, _audio: &[u8], _mime: &str) -> Result<String> {
        Err(anyhow!("{} does not support transcription", self.name()))
    }
}

/// Classify a vendor error as "model not found" — the only error class that
/// triggers the adapter-internal model-name fallback chain. Everything else
/// (auth, rate limit, 5xx, timeout) surfaces immediately.
pub(crate) fn is_model_not_found(err: &str) -> bool {
    let lower = err.to_lowercase();
    lower.contains("404")
        || lower.contains("model_not_found")
        || lower.contains("model not found")
        || lower.contains("does not exist")
        || lower.contains("decommissioned")
}
