//! LLM Provider Abstraction
//!
//! Defines the `ProviderAdapter` trait for plain-text completion against
//! heterogeneous LLM APIs. Adapters normalize responses into a `Completion`
//! and errors into classified `LlmError`s so the dispatcher can make
//! retry/rotate decisions without knowing which API produced them.
//!
//! ## Modules
//!
//! - `dispatch`: Health-ordered provider rotation with per-model fallback
//! - `openai_compat`: Chat Completions adapter (Groq, Gemini, OpenRouter, ...)
//! - `minimax`: MiniMax adapter with its non-standard response shapes

mod minimax;
mod openai_compat;

pub mod dispatch;

pub use dispatch::Dispatcher;
pub use minimax::MiniMaxProvider;
pub use openai_compat::OpenAiCompatProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::types::{RedpenError, Result};

// =============================================================================
// Completion
// =============================================================================

/// Normalized provider response: extracted text plus call metadata
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text, already unwrapped from the provider's envelope
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Provider identifier
    pub provider: String,
    /// Total tokens billed, when the provider reports usage
    pub tokens_used: Option<u32>,
    /// Round-trip time
    pub elapsed: Duration,
}

/// Shared provider type for concurrent access across pipeline stages.
pub type SharedProvider = Arc<dyn ProviderAdapter>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for a single provider entry
///
/// Note: API keys are handled securely - they are never serialized to output
/// and are redacted in debug output. Each adapter converts the key to
/// SecretString internally for runtime protection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Adapter kind: "openai-compatible" or "minimax"
    #[serde(default = "default_kind")]
    pub kind: String,
    /// API key. Never serialized to output for security
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Models to try in order on this provider
    #[serde(default)]
    pub models: Vec<String>,
    /// Context window in tokens, when it differs from the adapter default
    #[serde(default)]
    pub context_limit_tokens: Option<usize>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("models", &self.models)
            .field("context_limit_tokens", &self.context_limit_tokens)
            .finish()
    }
}

fn default_kind() -> String {
    "openai-compatible".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            api_key: None,
            api_base: None,
            models: Vec::new(),
            context_limit_tokens: None,
        }
    }
}

// =============================================================================
// Provider Adapter Trait
// =============================================================================

/// Adapter over one provider's completion API
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used in health tracking and logs
    fn id(&self) -> &str;

    /// Human-readable name for console output
    fn display_name(&self) -> &str;

    /// Models to try in order on this provider
    fn models(&self) -> &[String];

    /// Context window in tokens
    fn context_limit_tokens(&self) -> usize;

    /// Run one completion request against a specific model.
    ///
    /// `timeout` bounds the whole request; adapters map a deadline miss to
    /// `RedpenError::Timeout` so the retry engine treats it as a network
    /// fault.
    async fn complete(&self, prompt: &str, model: &str, timeout: Duration) -> Result<Completion>;
}

/// Create a shared provider adapter from configuration
pub fn create_provider(id: &str, config: &ProviderConfig) -> Result<SharedProvider> {
    match config.kind.as_str() {
        "openai-compatible" => Ok(Arc::new(OpenAiCompatProvider::new(id, config.clone())?)),
        "minimax" => Ok(Arc::new(MiniMaxProvider::new(id, config.clone())?)),
        other => Err(RedpenError::Config(format!(
            "Unknown provider kind: {}. Supported: openai-compatible, minimax",
            other
        ))),
    }
}
