//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/redpen/) and project (.redpen/) level
//! configuration. Provider entries are an ordered list: the order in the
//! file is the rotation order until health data says otherwise.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::provider::ProviderConfig;
use crate::ai::retry::RetryPolicy;
use crate::analysis::chunker::ChunkingConfig;
use crate::constants::{aggregation, retry, tokens};
use crate::types::{RedpenError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Providers in rotation order
    pub providers: Vec<ProviderEntry>,

    /// Provider id to escalate oversized aggregation prompts to
    pub high_context_provider: Option<String>,

    /// Retry and backoff settings
    pub retry: RetryConfig,

    /// Manuscript chunking settings
    pub chunking: ChunkingConfig,

    /// Analysis path thresholds
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            providers: Vec::new(),
            high_context_provider: None,
            retry: RetryConfig::default(),
            chunking: ChunkingConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `RedpenError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.providers.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(RedpenError::Config(format!(
                    "Provider entry {} has an empty id",
                    i + 1
                )));
            }
            if self.providers[..i].iter().any(|e| e.id == entry.id) {
                return Err(RedpenError::Config(format!(
                    "Duplicate provider id: {}",
                    entry.id
                )));
            }
        }

        if let Some(hc) = &self.high_context_provider
            && !self.providers.iter().any(|e| &e.id == hc)
        {
            return Err(RedpenError::Config(format!(
                "high_context_provider '{}' is not a configured provider",
                hc
            )));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(RedpenError::Config(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(RedpenError::Config(format!(
                "retry.jitter_factor must be between 0.0 and 1.0, got {}",
                self.retry.jitter_factor
            )));
        }

        self.chunking.validate()?;

        if self.analysis.direct_threshold_tokens == 0 {
            return Err(RedpenError::Config(
                "analysis.direct_threshold_tokens must be greater than 0".to_string(),
            ));
        }
        if self.analysis.aggregation_batch_size == 0 {
            return Err(RedpenError::Config(
                "analysis.aggregation_batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fill in missing API keys from `<ID>_API_KEY` environment variables
    pub fn resolve_api_keys(&mut self) {
        for entry in &mut self.providers {
            if entry.provider.api_key.is_none() {
                let var = format!("{}_API_KEY", entry.id.to_uppercase().replace('-', "_"));
                if let Ok(key) = std::env::var(&var)
                    && !key.trim().is_empty()
                {
                    entry.provider.api_key = Some(key);
                }
            }
        }
    }
}

// =============================================================================
// Provider Entry
// =============================================================================

/// One provider in the rotation, with its stable id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(flatten)]
    pub provider: ProviderConfig,
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            initial_delay_ms: retry::INITIAL_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            backoff_multiplier: retry::BACKOFF_MULTIPLIER,
            jitter_factor: retry::JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Manuscripts at or under this token estimate take the direct path
    pub direct_threshold_tokens: usize,

    /// Aggregation prompts at or under this estimate use provider rotation
    pub primary_safe_limit_tokens: usize,

    /// Chunk analyses per batch in multi-stage aggregation
    pub aggregation_batch_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            direct_threshold_tokens: tokens::DIRECT_ANALYSIS_THRESHOLD,
            primary_safe_limit_tokens: tokens::PRIMARY_SAFE_LIMIT,
            aggregation_batch_size: aggregation::BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ProviderEntry {
        ProviderEntry {
            id: id.to_string(),
            provider: ProviderConfig {
                api_key: Some("key".to_string()),
                models: vec!["m".to_string()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let config = Config {
            providers: vec![entry("groq"), entry("groq")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_high_context_provider_rejected() {
        let config = Config {
            providers: vec![entry("groq")],
            high_context_provider: Some("minimax".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_retry_settings_rejected() {
        let config = Config {
            retry: RetryConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_config_to_policy() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1_000));
    }

    #[test]
    fn test_provider_entry_toml_roundtrip() {
        let toml_src = r#"
            id = "groq"
            kind = "openai-compatible"
            api_base = "https://api.groq.com/openai/v1"
            models = ["llama-3.3-70b-versatile", "llama-3.1-8b-instant"]
        "#;
        let entry: ProviderEntry = toml::from_str(toml_src).unwrap();
        assert_eq!(entry.id, "groq");
        assert_eq!(entry.provider.models.len(), 2);
        assert!(entry.provider.api_key.is_none());
    }
}
