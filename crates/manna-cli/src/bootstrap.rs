//! Environment-based provider roster
//!
//! The gateway core never reads the process environment; this bootstrap layer
//! maps the deployment's env-var convention into an explicit ordered
//! [`GatewayConfig`]. The roster order is the failover priority order.

use manna_gateway::{GatewayConfig, ProviderConfig, ProviderKind};

pub struct RosterEntry {
    pub kind: ProviderKind,
    /// Display-name override for this slot
    pub name: Option<&'static str>,
    /// Env vars checked in order; the first one set wins. Lower-case aliases
    /// are legacy key names still present in older deployments.
    pub keys: &'static [&'static str],
}

/// Full provider roster in priority order, including unconfigured slots
pub const ROSTER: &[RosterEntry] = &[
    RosterEntry {
        kind: ProviderKind::Gemini,
        name: None,
        keys: &["GEMINI_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Groq,
        name: None,
        keys: &["GROQ_API_KEY", "groqKey"],
    },
    RosterEntry {
        kind: ProviderKind::Mistral,
        name: None,
        keys: &["MISTRAL_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Together,
        name: None,
        keys: &["together_api", "TOGETHER_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Xai,
        name: None,
        keys: &["XAI_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Gemini,
        name: Some("Gemini-Backup"),
        keys: &["google_aistudio_key"],
    },
    RosterEntry {
        kind: ProviderKind::Sambanova,
        name: None,
        keys: &["sambanova_api", "SAMBANOVA_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Cerebras,
        name: None,
        keys: &["cerebras_api", "CEREBRAS_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Openrouter,
        name: None,
        keys: &["OPENROUTER_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Deepinfra,
        name: None,
        keys: &["deepinfra", "DEEPINFRA_API_KEY"],
    },
    RosterEntry {
        kind: ProviderKind::Huggingface,
        name: None,
        keys: &["HUGGINGFACE_API_KEY"],
    },
];

impl RosterEntry {
    pub fn display_name(&self) -> &'static str {
        self.name.unwrap_or_else(|| self.kind.display_name())
    }
}

/// Build the gateway configuration from the process environment
pub fn config_from_env() -> GatewayConfig {
    config_from(|key| std::env::var(key).ok())
}

/// Build the configuration from an arbitrary key lookup. Unconfigured slots
/// keep a blank credential so tooling can report them as missing.
pub fn config_from(lookup: impl Fn(&str) -> Option<String>) -> GatewayConfig {
    let providers = ROSTER
        .iter()
        .map(|entry| {
            let api_key = entry
                .keys
                .iter()
                .find_map(|&key| lookup(key))
                .unwrap_or_default();
            let mut cfg = ProviderConfig::new(entry.kind, api_key);
            if let Some(name) = entry.name {
                cfg = cfg.with_name(name);
            }
            cfg
        })
        .collect();
    GatewayConfig { providers }
}
