//! OpenAI-Compatible Chat Completions Adapter
//!
//! Covers every provider that speaks the Chat Completions wire format:
//! Groq, Gemini (OpenAI-compat endpoint), OpenRouter, and self-hosted
//! gateways. Error bodies and transport failures are run through the
//! classifier so the dispatcher sees categorized `LlmError`s.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{Completion, ProviderAdapter, ProviderConfig};
use crate::constants::llm;
use crate::types::{ErrorClassifier, RedpenError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CONTEXT_LIMIT: usize = 8_192;

/// Chat Completions adapter with secure API key handling
pub struct OpenAiCompatProvider {
    id: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    models: Vec<String>,
    context_limit_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("id", &self.id)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("models", &self.models)
            .field("context_limit_tokens", &self.context_limit_tokens)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(id: &str, config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.ok_or_else(|| {
            RedpenError::Config(format!("Provider '{}' has no API key configured", id))
        })?;

        if config.models.is_empty() {
            return Err(RedpenError::Config(format!(
                "Provider '{}' has no models configured",
                id
            )));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RedpenError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            id: id.to_string(),
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            models: config.models,
            context_limit_tokens: config.context_limit_tokens.unwrap_or(DEFAULT_CONTEXT_LIMIT),
            client,
        })
    }

    fn build_request(&self, prompt: &str, model: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: llm::TEMPERATURE,
            max_tokens: Some(llm::MAX_COMPLETION_TOKENS),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn context_limit_tokens(&self) -> usize {
        self.context_limit_tokens
    }

    async fn complete(&self, prompt: &str, model: &str, timeout: Duration) -> Result<Completion> {
        let start_time = Instant::now();
        let request = self.build_request(prompt, model);
        let url = format!("{}/chat/completions", self.api_base);

        debug!(provider = %self.id, model, timeout_ms = timeout.as_millis() as u64, "sending request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RedpenError::timeout(format!("{} request", self.id), timeout)
                } else {
                    ErrorClassifier::classify(&e.to_string(), &self.id).into()
                }
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.id, model, status, "request failed");
            return Err(ErrorClassifier::classify_http_status(status, &body, &self.id).into());
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), &self.id))?;

        let text = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ErrorClassifier::classify("Empty response from provider", &self.id))?
            .to_string();

        debug!(
            provider = %self.id,
            model,
            elapsed_ms = elapsed.as_millis() as u64,
            chars = text.len(),
            "completion received"
        );

        Ok(Completion {
            text,
            model: model.to_string(),
            provider: self.id.clone(),
            tokens_used: body.usage.map(|u| u.total_tokens),
            elapsed,
        })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("test-key".to_string()),
            models: vec!["llama-3.3-70b-versatile".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = ProviderConfig {
            models: vec!["m".to_string()],
            ..Default::default()
        };
        assert!(OpenAiCompatProvider::new("groq", config).is_err());
    }

    #[test]
    fn test_new_requires_models() {
        let config = ProviderConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        assert!(OpenAiCompatProvider::new("groq", config).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = OpenAiCompatProvider::new("groq", config_with_key()).unwrap();
        let debug = format!("{:?}", provider);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "choices": [{"message": {"content": "The prose is strong."}}],
            "usage": {"total_tokens": 120}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("The prose is strong.")
        );
        assert_eq!(parsed.usage.unwrap().total_tokens, 120);
    }
}
