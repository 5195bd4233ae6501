//! Gateway configuration
//!
//! The core never inspects the process environment. Callers supply an
//! explicit ordered list of provider entries; the order of the list is the
//! failover priority order.

use serde::{Deserialize, Serialize};

/// Ordered provider roster for one [`ProviderManager`](crate::ProviderManager)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
}

/// One provider entry. A blank `api_key` means the provider is not
/// configured and will be skipped when building the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Display-name override (e.g. "Gemini-Backup" for a second Gemini key)
    #[serde(default)]
    pub name: Option<String>,
    /// Model chain override; replaces the vendor's built-in fallback list
    #[serde(default)]
    pub models: Option<Vec<String>>,
    /// Per-call timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            enabled: true,
            name: None,
            models: None,
            timeout_secs: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Supported vendor endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Groq,
    Mistral,
    Together,
    Xai,
    Sambanova,
    Cerebras,
    Openrouter,
    Deepinfra,
    Huggingface,
}

impl ProviderKind {
    /// Default display name for this vendor
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Groq => "Groq",
            Self::Mistral => "Mistral",
            Self::Together => "Together AI",
            Self::Xai => "xAI",
            Self::Sambanova => "SambaNova",
            Self::Cerebras => "Cerebras",
            Self::Openrouter => "OpenRouter",
            Self::Deepinfra => "DeepInfra",
            Self::Huggingface => "Hugging Face",
        }
    }
}
