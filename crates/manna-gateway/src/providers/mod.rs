//! Multi-provider text generation with automatic failover
//!
//! Vendors implement the [`TextProvider`] trait and are composed via
//! [`ProviderManager`], which tries them strictly in priority order and
//! degrades to a recovery response when every backend fails.

pub mod gemini;
pub mod manager;
pub mod openai_compat;
mod sse;
pub mod types;

pub use gemini::GeminiProvider;
pub use manager::{
    GatewayError, ProviderManager, RECOVERY_PROVIDER, STATIC_FALLBACK_SUFFIX, build_providers,
};
pub use openai_compat::OpenAiCompatProvider;
pub use types::{Generation, StreamHandle, TextProvider, TextStream};
