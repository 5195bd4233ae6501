//! Google Gemini provider (native Generative Language API)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::sse::sse_text_stream;
use super::types::{TextProvider, TextStream, is_model_not_found};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model-name fallback chain, tried in order when Gemini reports the
/// requested model as unavailable. Absorbs Google's model-alias churn.
const DEFAULT_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-flash-latest", "gemini-1.5-flash"];

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("name", &self.name)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            name: "Gemini".to_string(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
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

    async fn generate_with_model(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let body = request_body(prompt);

        debug!("Gemini request: model={}", model);

        let call = async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .context("Failed to send request to Gemini API")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow!("Gemini API error {}: {}", status, error_text));
            }

            let api_response: GeminiApiResponse = response
                .json()
                .await
                .context("Failed to parse Gemini API response")?;

            Self::text_from_response(api_response)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "Gemini request timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }

    /// Extract the concatenated candidate text from a Gemini response
    fn text_from_response(resp: GeminiApiResponse) -> Result<String> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini response had no candidates"))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(anyhow!("Gemini response contained no text"));
        }
        Ok(text)
    }

    fn stream_delta(value: &Value) -> Option<String> {
        match value["candidates"][0]["content"]["parts"][0]["text"].as_str() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for model in &self.models {
            match self.generate_with_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if is_model_not_found(&e.to_string()) => {
                    warn!("Gemini model {} unavailable, trying next: {}", model, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No Gemini models configured")))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        // Streaming uses the head of the model chain only; model fallback is
        // a one-shot concern and the manager has its own failover path.
        let model = self
            .models
            .first()
            .ok_or_else(|| anyhow!("No Gemini models configured"))?;
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        );
        let body = request_body(prompt);

        debug!("Gemini stream open: model={}", model);

        let open = async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .context("Failed to open Gemini stream")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow!("Gemini API error {}: {}", status, error_text));
            }
            Ok(response)
        };

        let response = match tokio::time::timeout(self.timeout, open).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(anyhow!(
                    "Gemini stream open timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        Ok(sse_text_stream(response, Self::stream_delta))
    }
}

fn request_body(prompt: &str) -> Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt}],
        }],
        "generationConfig": {
            "temperature": 0.7,
            "maxOutputTokens": 2048,
        },
    })
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}
