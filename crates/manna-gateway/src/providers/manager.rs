//! Provider manager with automatic failover across vendors
//!
//! Providers are tried strictly in priority order, one at a time — vendor
//! calls are billed and rate-limited per attempt, so there is no racing.
//! Every attempt is written to the injected [`AttemptSink`]; sink failures
//! are swallowed so audit logging can never break a generation.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::{AttemptRecord, AttemptSink, NullSink};
use crate::config::{GatewayConfig, ProviderConfig, ProviderKind};

use super::gemini::GeminiProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::types::{Generation, StreamHandle, TextProvider, TextStream};

/// Provider name reported when every real backend failed and the manager
/// degraded to the recovery response.
pub const RECOVERY_PROVIDER: &str = "System Recovery";

/// Suffix appended to the provider name when a stream was synthesized from
/// the one-shot path instead of a true vendor stream.
pub const STATIC_FALLBACK_SUFFIX: &str = " (Static Fallback)";

/// Errors the manager can surface to callers.
///
/// Vendor failures are not in this list on purpose: "a backend is down" is an
/// expected operating condition handled by failover and degrade, while "zero
/// backends configured" is a deploy-time bug and must be raised distinctly.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no AI providers configured; set at least one provider API key")]
    NoProvidersConfigured,

    #[error("no transcription backend available: {0}")]
    NoTranscriptionBackend(String),

    #[error("all streaming providers failed: {0}")]
    StreamExhausted(String),
}

/// Routes generation requests across multiple providers with automatic
/// failover. The provider list is read-only after construction and safe to
/// share across concurrent requests.
pub struct ProviderManager {
    providers: Vec<Box<dyn TextProvider>>,
    sink: Arc<dyn AttemptSink>,
}

impl ProviderManager {
    /// Create a manager with the given providers and no audit sink.
    ///
    /// An empty list is accepted; generation calls will fail with
    /// [`GatewayError::NoProvidersConfigured`].
    pub fn new(providers: Vec<Box<dyn TextProvider>>) -> Self {
        Self::with_sink(providers, Arc::new(NullSink))
    }

    /// Create a manager that records every attempt to `sink`
    pub fn with_sink(providers: Vec<Box<dyn TextProvider>>, sink: Arc<dyn AttemptSink>) -> Self {
        Self { providers, sink }
    }

    /// Build a manager from an ordered configuration roster
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(build_providers(config))
    }

    /// Build a manager from configuration with an audit sink
    pub fn from_config_with_sink(config: &GatewayConfig, sink: Arc<dyn AttemptSink>) -> Self {
        Self::with_sink(build_providers(config), sink)
    }

    /// Provider names in failover order, for health reporting
    pub fn active_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of configured providers
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Generate a response, failing over to the next provider on error.
    ///
    /// Never fails for "all backends down" — that case degrades to an
    /// apologetic response tagged [`RECOVERY_PROVIDER`] carrying per-provider
    /// diagnostics, so operators can see what failed straight from the reply.
    pub async fn generate_response(&self, prompt: &str) -> Result<Generation, GatewayError> {
        if self.providers.is_empty() {
            return Err(GatewayError::NoProvidersConfigured);
        }

        let mut failures: Vec<(String, String)> = Vec::new();

        for provider in &self.providers {
            debug!("Trying provider {}", provider.name());
            let start = Instant::now();

            match provider.generate(prompt).await {
                Ok(text) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    info!("Response from {} in {}ms", provider.name(), latency_ms);
                    self.emit(AttemptRecord::success(provider.name(), prompt, &text, latency_ms))
                        .await;
                    return Ok(Generation {
                        text,
                        provider: provider.name().to_string(),
                    });
                }
                Err(e) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    let error = e.to_string();
                    warn!("Provider {} failed after {}ms: {}", provider.name(), latency_ms, error);
                    self.emit(AttemptRecord::failure(provider.name(), prompt, &error, latency_ms))
                        .await;
                    failures.push((provider.name().to_string(), error));
                }
            }
        }

        info!("All {} providers failed, degrading to recovery response", failures.len());
        Ok(Generation {
            text: recovery_message(&failures),
            provider: RECOVERY_PROVIDER.to_string(),
        })
    }

    /// Open a text stream from the first streaming-capable provider that
    /// accepts the request.
    ///
    /// When no stream can be opened, falls back to the one-shot path and
    /// wraps its full text as a single-chunk stream, with the provider name
    /// suffixed [`STATIC_FALLBACK_SUFFIX`] so consumers can tell a synthesized
    /// stream from a real one.
    pub async fn generate_stream(&self, prompt: &str) -> Result<StreamHandle, GatewayError> {
        let mut failures: Vec<(String, String)> = Vec::new();

        for provider in self.providers.iter().filter(|p| p.supports_streaming()) {
            debug!("Opening stream from {}", provider.name());
            let start = Instant::now();

            match provider.generate_stream(prompt).await {
                Ok(stream) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    info!("Stream opened by {} in {}ms", provider.name(), latency_ms);
                    self.emit(AttemptRecord::success(
                        provider.name(),
                        prompt,
                        "[stream opened]",
                        latency_ms,
                    ))
                    .await;
                    return Ok(StreamHandle {
                        stream,
                        provider: provider.name().to_string(),
                    });
                }
                Err(e) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    let error = e.to_string();
                    warn!("Stream open via {} failed: {}", provider.name(), error);
                    self.emit(AttemptRecord::failure(provider.name(), prompt, &error, latency_ms))
                        .await;
                    failures.push((provider.name().to_string(), error));
                }
            }
        }

        info!("No stream could be opened, falling back to one-shot generation");
        match self.generate_response(prompt).await {
            Ok(generation) => {
                let provider = format!("{}{}", generation.provider, STATIC_FALLBACK_SUFFIX);
                let stream: TextStream =
                    Box::pin(futures::stream::iter(vec![Ok(generation.text)]));
                Ok(StreamHandle { stream, provider })
            }
            Err(e) => {
                let mut detail: Vec<String> = failures
                    .iter()
                    .map(|(name, error)| format!("{}: {}", name, error))
                    .collect();
                detail.push(format!("fallback: {}", e));
                Err(GatewayError::StreamExhausted(detail.join("; ")))
            }
        }
    }

    /// Delegate transcription to the first transcription-capable provider.
    ///
    /// Intentionally not a failover loop — only one vendor in a typical
    /// deployment supports speech-to-text.
    pub async fn transcribe_audio(&self, audio: &[u8], mime: &str) -> Result<String, GatewayError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.supports_transcription())
            .ok_or_else(|| {
                GatewayError::NoTranscriptionBackend(
                    "no transcription-capable provider configured".to_string(),
                )
            })?;

        debug!("Transcribing {} bytes via {}", audio.len(), provider.name());
        provider
            .transcribe(audio, mime)
            .await
            .map_err(|e| GatewayError::NoTranscriptionBackend(e.to_string()))
    }

    async fn emit(&self, attempt: AttemptRecord) {
        if let Err(e) = self.sink.record(&attempt).await {
            warn!("Attempt log write failed: {}", e);
        }
    }
}

/// Build provider instances from a configuration roster, preserving order.
/// Entries that are disabled or have a blank credential are skipped.
pub fn build_providers(config: &GatewayConfig) -> Vec<Box<dyn TextProvider>> {
    config
        .providers
        .iter()
        .filter(|p| p.enabled && !p.api_key.is_empty())
        .map(build_provider)
        .collect()
}

fn build_provider(cfg: &ProviderConfig) -> Box<dyn TextProvider> {
    if cfg.kind == ProviderKind::Gemini {
        let mut p = GeminiProvider::new(cfg.api_key.clone());
        if let Some(name) = &cfg.name {
            p = p.with_name(name.clone());
        }
        if let Some(models) = &cfg.models {
            p = p.with_models(models.clone());
        }
        if let Some(secs) = cfg.timeout_secs {
            p = p.with_timeout(Duration::from_secs(secs));
        }
        return Box::new(p);
    }

    let key = cfg.api_key.clone();
    let mut p = match cfg.kind {
        ProviderKind::Groq => OpenAiCompatProvider::groq(key),
        ProviderKind::Mistral => OpenAiCompatProvider::mistral(key),
        ProviderKind::Together => OpenAiCompatProvider::together(key),
        ProviderKind::Xai => OpenAiCompatProvider::xai(key),
        ProviderKind::Sambanova => OpenAiCompatProvider::sambanova(key),
        ProviderKind::Cerebras => OpenAiCompatProvider::cerebras(key),
        ProviderKind::Openrouter => OpenAiCompatProvider::openrouter(key),
        ProviderKind::Deepinfra => OpenAiCompatProvider::deepinfra(key),
        ProviderKind::Huggingface => OpenAiCompatProvider::huggingface(key),
        ProviderKind::Gemini => unreachable!("handled above"),
    };
    if let Some(name) = &cfg.name {
        p = p.with_name(name.clone());
    }
    if let Some(models) = &cfg.models {
        p = p.with_models(models.clone());
    }
    if let Some(secs) = cfg.timeout_secs {
        p = p.with_timeout(Duration::from_secs(secs));
    }
    Box::new(p)
}

/// Compose the user-presentable degraded response, embedding every
/// provider's failure so the reply itself is diagnosable.
fn recovery_message(failures: &[(String, String)]) -> String {
    let detail: Vec<String> = failures
        .iter()
        .map(|(name, error)| format!("- {}: {}", name, error))
        .collect();
    format!(
        "🙏 **All AI providers are currently at capacity.**\n\n\
         Please wait 30-60 seconds and try again. The Word is worth the wait!\n\n{}",
        detail.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock provider that succeeds
    struct SuccessProvider {
        name: String,
        reply: String,
        calls: AtomicUsize,
    }

    impl SuccessProvider {
        fn new(name: &str, reply: &str) -> Self {
            Self {
                name: name.to_string(),
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextProvider for SuccessProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    /// Mock provider that always fails
    struct FailProvider {
        name: String,
        error: String,
    }

    impl FailProvider {
        fn new(name: &str, error: &str) -> Self {
            Self {
                name: name.to_string(),
                error: error.to_string(),
            }
        }
    }

    #[async_trait]
    impl TextProvider for FailProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("{}", self.error))
        }
    }

    /// Mock streaming provider that opens a stream of fixed chunks
    struct StreamProvider {
        name: String,
        chunks: Vec<String>,
    }

    #[async_trait]
    impl TextProvider for StreamProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.chunks.join(""))
        }
        fn supports_streaming(&self) -> bool {
            true
        }
        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
            let items: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    /// Mock streaming provider whose stream never opens
    struct StreamFailProvider {
        name: String,
        error: String,
    }

    #[async_trait]
    impl TextProvider for StreamFailProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("{}", self.error))
        }
        fn supports_streaming(&self) -> bool {
            true
        }
        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
            Err(anyhow!("{}", self.error))
        }
    }

    /// Mock transcription-only provider
    struct TranscribeProvider;

    #[async_trait]
    impl TextProvider for TranscribeProvider {
        fn name(&self) -> &str {
            "Whisper"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("chat unsupported"))
        }
        fn supports_transcription(&self) -> bool {
            true
        }
        async fn transcribe(&self, _audio: &[u8], _mime: &str) -> Result<String> {
            Ok("our daily bread".to_string())
        }
    }

    /// Sink that keeps every record in memory
    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<AttemptRecord>>,
    }

    impl RecordingSink {
        fn records(&self) -> Vec<AttemptRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttemptSink for RecordingSink {
        async fn record(&self, attempt: &AttemptRecord) -> Result<()> {
            self.records.lock().unwrap().push(attempt.clone());
            Ok(())
        }
    }

    /// Sink that always fails
    struct FailingSink;

    #[async_trait]
    impl AttemptSink for FailingSink {
        async fn record(&self, _attempt: &AttemptRecord) -> Result<()> {
            Err(anyhow!("sink down"))
        }
    }

    #[tokio::test]
    async fn test_failover_to_second_provider() {
        let sink = Arc::new(RecordingSink::default());
        let manager = ProviderManager::with_sink(
            vec![
                Box::new(FailProvider::new("A", "rate limited")),
                Box::new(SuccessProvider::new("B", "Hello world")),
            ],
            sink.clone(),
        );

        let result = manager.generate_response("hi").await.unwrap();
        assert_eq!(result.text, "Hello world");
        assert_eq!(result.provider, "B");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].is_success());
        assert_eq!(records[0].provider, "A");
        assert!(records[1].is_success());
        assert_eq!(records[1].provider, "B");
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let sink = Arc::new(RecordingSink::default());
        let manager = ProviderManager::with_sink(
            vec![
                Box::new(FailProvider::new("A", "boom")),
                Box::new(SuccessProvider::new("B", "from B")),
                Box::new(SuccessProvider::new("C", "from C")),
            ],
            sink.clone(),
        );

        let result = manager.generate_response("hi").await.unwrap();
        assert_eq!(result.provider, "B");
        // C was never invoked: exactly two attempt records
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn test_all_fail_degrades_to_recovery() {
        let sink = Arc::new(RecordingSink::default());
        let manager = ProviderManager::with_sink(
            vec![
                Box::new(FailProvider::new("A", "rate limited")),
                Box::new(FailProvider::new("B", "HTTP 503: overloaded")),
            ],
            sink.clone(),
        );

        let result = manager.generate_response("hi").await.unwrap();
        assert_eq!(result.provider, RECOVERY_PROVIDER);
        assert!(result.text.contains("A: rate limited"));
        assert!(result.text.contains("B: HTTP 503: overloaded"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.is_success()));
    }

    #[tokio::test]
    async fn test_single_failure_scenario() {
        let manager =
            ProviderManager::new(vec![Box::new(FailProvider::new("A", "auth error"))]);

        let result = manager.generate_response("hi").await.unwrap();
        assert_eq!(result.provider, "System Recovery");
        assert!(result.text.contains("A: auth error"));
    }

    #[tokio::test]
    async fn test_empty_list_is_a_configuration_error() {
        let sink = Arc::new(RecordingSink::default());
        let manager = ProviderManager::with_sink(vec![], sink.clone());

        let err = manager.generate_response("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::NoProvidersConfigured));
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_stream_first_open_wins() {
        let sink = Arc::new(RecordingSink::default());
        let manager = ProviderManager::with_sink(
            vec![
                Box::new(StreamProvider {
                    name: "A".to_string(),
                    chunks: vec!["Hello ".to_string(), "world".to_string()],
                }),
                Box::new(SuccessProvider::new("B", "unused")),
            ],
            sink.clone(),
        );

        let handle = manager.generate_stream("hi").await.unwrap();
        assert_eq!(handle.provider, "A");

        let chunks: Vec<String> = handle
            .stream
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Hello ", "world"]);

        // Only the stream-open attempt was recorded; B never ran
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider, "A");
        assert!(records[0].is_success());
    }

    #[tokio::test]
    async fn test_stream_falls_back_to_one_shot() {
        let manager = ProviderManager::new(vec![
            Box::new(StreamFailProvider {
                name: "A".to_string(),
                error: "connection refused".to_string(),
            }),
            Box::new(SuccessProvider::new("B", "full text")),
        ]);

        let handle = manager.generate_stream("hi").await.unwrap();
        assert_eq!(handle.provider, "B (Static Fallback)");

        let chunks: Vec<String> = handle.stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(chunks, vec!["full text"]);
    }

    #[tokio::test]
    async fn test_stream_fallback_degrades_when_everything_is_down() {
        // Streaming open fails and the one-shot retry fails too: the caller
        // still gets a recovery response wrapped as a single-chunk stream.
        let manager = ProviderManager::new(vec![Box::new(StreamFailProvider {
            name: "A".to_string(),
            error: "HTTP 500".to_string(),
        })]);

        let handle = manager.generate_stream("hi").await.unwrap();
        assert_eq!(
            handle.provider,
            format!("{}{}", RECOVERY_PROVIDER, STATIC_FALLBACK_SUFFIX)
        );
    }

    #[tokio::test]
    async fn test_stream_with_no_providers_is_exhausted() {
        let manager = ProviderManager::new(vec![]);
        let err = manager.generate_stream("hi").await.unwrap_err();
        match err {
            GatewayError::StreamExhausted(detail) => {
                assert!(detail.contains("no AI providers configured"));
            }
            other => panic!("expected StreamExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_sink_never_breaks_generation() {
        let manager = ProviderManager::with_sink(
            vec![
                Box::new(FailProvider::new("A", "rate limited")),
                Box::new(SuccessProvider::new("B", "Hello world")),
            ],
            Arc::new(FailingSink),
        );

        let result = manager.generate_response("hi").await.unwrap();
        assert_eq!(result.text, "Hello world");
        assert_eq!(result.provider, "B");

        let handle = manager.generate_stream("hi").await.unwrap();
        assert_eq!(handle.provider, "B (Static Fallback)");
    }

    #[tokio::test]
    async fn test_transcription_delegates_to_first_capable() {
        let manager = ProviderManager::new(vec![
            Box::new(SuccessProvider::new("A", "text")),
            Box::new(TranscribeProvider),
        ]);

        let text = manager
            .transcribe_audio(&[1, 2, 3], "audio/webm")
            .await
            .unwrap();
        assert_eq!(text, "our daily bread");
    }

    #[tokio::test]
    async fn test_transcription_without_backend_fails_clearly() {
        let manager = ProviderManager::new(vec![Box::new(SuccessProvider::new("A", "text"))]);
        let err = manager
            .transcribe_audio(&[1, 2, 3], "audio/webm")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoTranscriptionBackend(_)));
    }

    #[test]
    fn test_from_config_order_is_deterministic() {
        let config = GatewayConfig {
            providers: vec![
                ProviderConfig::new(ProviderKind::Gemini, "g"),
                ProviderConfig::new(ProviderKind::Groq, "q"),
                ProviderConfig::new(ProviderKind::Openrouter, "o"),
            ],
        };

        let first = ProviderManager::from_config(&config);
        let second = ProviderManager::from_config(&config);
        assert_eq!(first.active_providers(), second.active_providers());
        assert_eq!(first.active_providers(), vec!["Gemini", "Groq", "OpenRouter"]);
    }

    #[test]
    fn test_from_config_skips_blank_and_disabled() {
        let mut disabled = ProviderConfig::new(ProviderKind::Mistral, "m");
        disabled.enabled = false;

        let config = GatewayConfig {
            providers: vec![
                ProviderConfig::new(ProviderKind::Gemini, ""),
                disabled,
                ProviderConfig::new(ProviderKind::Cerebras, "c"),
            ],
        };

        let manager = ProviderManager::from_config(&config);
        assert_eq!(manager.active_providers(), vec!["Cerebras"]);
        assert_eq!(manager.provider_count(), 1);
    }

    #[test]
    fn test_from_config_applies_name_override() {
        let config = GatewayConfig {
            providers: vec![
                ProviderConfig::new(ProviderKind::Gemini, "k1"),
                ProviderConfig::new(ProviderKind::Gemini, "k2").with_name("Gemini-Backup"),
            ],
        };
        let manager = ProviderManager::from_config(&config);
        assert_eq!(manager.active_providers(), vec!["Gemini", "Gemini-Backup"]);
    }

    #[test]
    fn test_recovery_message_embeds_all_failures() {
        let msg = recovery_message(&[
            ("Gemini".to_string(), "HTTP 429".to_string()),
            ("Groq".to_string(), "timed out after 8s".to_string()),
        ]);
        assert!(msg.contains("Gemini: HTTP 429"));
        assert!(msg.contains("Groq: timed out after 8s"));
        assert!(msg.contains("try again"));
    }
}
