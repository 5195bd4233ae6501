//! manna-gateway - multi-provider AI gateway with automatic failover
//!
//! This crate provides:
//! - A [`TextProvider`] trait implemented once per vendor (one-shot generation
//!   required, streaming and transcription optional capabilities)
//! - Vendor adapters for Gemini and a family of OpenAI-compatible endpoints
//!   (Groq, Mistral, Together AI, xAI, SambaNova, Cerebras, OpenRouter,
//!   DeepInfra, Hugging Face)
//! - A [`ProviderManager`] that tries providers in priority order and degrades
//!   to a user-presentable recovery response when every backend is down
//! - An [`AttemptSink`] audit trail that records every generation attempt

pub mod audit;
pub mod config;
pub mod providers;

// Re-export main types for convenience
pub use audit::{AttemptOutcome, AttemptRecord, AttemptSink, JsonlSink, NullSink};
pub use config::{GatewayConfig, ProviderConfig, ProviderKind};
pub use providers::{
    GatewayError, GeminiProvider, Generation, OpenAiCompatProvider, ProviderManager,
    RECOVERY_PROVIDER, STATIC_FALLBACK_SUFFIX, StreamHandle, TextProvider, TextStream,
    build_providers,
};
