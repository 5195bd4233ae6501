//! OpenAI-compatible chat provider for Groq, Mistral, Together, xAI,
//! SambaNova, Cerebras, OpenRouter, DeepInfra and Hugging Face.
//!
//! All of these vendors speak the `/chat/completions` wire format; only the
//! base URL, model chain, timeout and capability set differ.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::sse::sse_text_stream;
use super::types::{TextProvider, TextStream, is_model_not_found};

/// Upload-heavy transcription calls get a fixed budget independent of the
/// vendor's chat timeout.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible provider
pub struct OpenAiCompatProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    timeout: Duration,
    streaming: bool,
    transcription_model: Option<String>,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .field("streaming", &self.streaming)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// Create a provider for any OpenAI-compatible endpoint.
    ///
    /// - `name`: display label (e.g. "Groq", "Together AI")
    /// - `base_url`: endpoint root (e.g. `https://api.groq.com/openai/v1`)
    /// - `models`: model chain, tried in order on "model not found" errors
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        base_url: impl Into<String>,
        models: Vec<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            name: name.into(),
            api_key,
            base_url: base_url.into(),
            models,
            timeout,
            streaming: false,
            transcription_model: None,
        }
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_transcription(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = Some(model.into());
        self
    }

    // ── vendor profiles ──

    pub fn groq(api_key: String) -> Self {
        Self::new(
            "Groq",
            api_key,
            "https://api.groq.com/openai/v1",
            vec![
                "llama-3.3-70b-versatile".to_string(),
                "llama-3.1-8b-instant".to_string(),
            ],
            Duration::from_secs(8),
        )
        .with_streaming()
        .with_transcription("whisper-large-v3-turbo")
    }

    pub fn mistral(api_key: String) -> Self {
        Self::new(
            "Mistral",
            api_key,
            "https://api.mistral.ai/v1",
            vec!["mistral-small-latest".to_string()],
            Duration::from_secs(8),
        )
        .with_streaming()
    }

    pub fn together(api_key: String) -> Self {
        Self::new(
            "Together AI",
            api_key,
            "https://api.together.xyz/v1",
            vec![
                "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string(),
                "meta-llama/Llama-3-70b-chat-hf".to_string(),
            ],
            Duration::from_secs(60),
        )
        .with_streaming()
    }

    pub fn xai(api_key: String) -> Self {
        Self::new(
            "xAI",
            api_key,
            "https://api.x.ai/v1",
            vec!["grok-2-latest".to_string()],
            Duration::from_secs(60),
        )
        .with_streaming()
    }

    pub fn sambanova(api_key: String) -> Self {
        Self::new(
            "SambaNova",
            api_key,
            "https://api.sambanova.ai/v1",
            vec!["Meta-Llama-3.3-70B-Instruct".to_string()],
            Duration::from_secs(8),
        )
    }

    pub fn cerebras(api_key: String) -> Self {
        Self::new(
            "Cerebras",
            api_key,
            "https://api.cerebras.ai/v1",
            vec!["llama-3.1-8b".to_string()],
            Duration::from_secs(8),
        )
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::new(
            "OpenRouter",
            api_key,
            "https://openrouter.ai/api/v1",
            vec!["meta-llama/llama-3.3-70b-instruct:free".to_string()],
            Duration::from_secs(60),
        )
        .with_streaming()
    }

    pub fn deepinfra(api_key: String) -> Self {
        Self::new(
            "DeepInfra",
            api_key,
            "https://api.deepinfra.com/v1/openai",
            vec!["meta-llama/Llama-3.3-70B-Instruct".to_string()],
            Duration::from_secs(60),
        )
    }

    pub fn huggingface(api_key: String) -> Self {
        Self::new(
            "Hugging Face",
            api_key,
            "https://router.huggingface.co/hf-inference/models/mistralai/Mistral-7B-Instruct-v0.2/v1",
            vec!["mistralai/Mistral-7B-Instruct-v0.2".to_string()],
            Duration::from_secs(60),
        )
    }

    fn request_body(&self, model: &str, prompt: &str, stream: bool) -> Value {
        serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7,
            "max_tokens": 2048,
            "stream": stream,
        })
    }

    async fn chat_once(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(model, prompt, false);

        debug!("{} request: model={}", self.name, model);

        let call = async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", self.name))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow!("{} API error {}: {}", self.name, status, error_text));
            }

            let api_response: ChatCompletionResponse = response
                .json()
                .await
                .with_context(|| format!("Failed to parse {} response", self.name))?;

            Self::text_from_response(api_response)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} request timed out after {}s",
                self.name,
                self.timeout.as_secs()
            )),
        }
    }

    /// Extract the assistant text from a chat completion response
    fn text_from_response(resp: ChatCompletionResponse) -> Result<String> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Response had no choices"))?;

        match choice.message.content {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(anyhow!("Response contained no text")),
        }
    }

    fn stream_delta(value: &Value) -> Option<String> {
        match value["choices"][0]["delta"]["content"].as_str() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for model in &self.models {
            match self.chat_once(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if is_model_not_found(&e.to_string()) => {
                    warn!("{} model {} unavailable, trying next: {}", self.name, model, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No {} models configured", self.name)))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let model = self
            .models
            .first()
            .ok_or_else(|| anyhow!("No {} models configured", self.name))?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(model, prompt, true);

        debug!("{} stream open: model={}", self.name, model);

        let open = async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Failed to open {} stream", self.name))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow!("{} API error {}: {}", self.name, status, error_text));
            }
            Ok(response)
        };

        let response = match tokio::time::timeout(self.timeout, open).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(anyhow!(
                    "{} stream open timed out after {}s",
                    self.name,
                    self.timeout.as_secs()
                ));
            }
        };

        Ok(sse_text_stream(response, Self::stream_delta))
    }

    fn supports_transcription(&self) -> bool {
        self.transcription_model.is_some()
    }

    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String> {
        let Some(model) = &self.transcription_model else {
            return Err(anyhow!("{} does not support transcription", self.name));
        };

        debug!("{} transcribe: {} bytes, {}", self.name, audio.len(), mime);

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.webm")
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", model.clone())
            .text("response_format", "json");

        let url = format!("{}/audio/transcriptions", self.base_url);

        let call = async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .multipart(form)
                .send()
                .await
                .with_context(|| format!("Failed to send {} transcription request", self.name))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "{} transcription error {}: {}",
                    self.name,
                    status,
                    error_text
                ));
            }

            let body: Value = response
                .json()
                .await
                .with_context(|| format!("Failed to parse {} transcription response", self.name))?;

            Ok(body["text"].as_str().unwrap_or("").trim().to_string())
        };

        match tokio::time::timeout(TRANSCRIBE_TIMEOUT, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} transcription timed out after {}s",
                self.name,
                TRANSCRIBE_TIMEOUT.as_secs()
            )),
        }
    }
}

// ── chat completion wire types ──

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
