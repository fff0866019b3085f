//! MiniMax Adapter
//!
//! High-context escalation provider. MiniMax does not speak the Chat
//! Completions format: requests use sender-typed messages and responses have
//! been observed in four different shapes (`reply`, `text`, `content`, and a
//! Chat Completions-style `choices` array), sometimes varying between calls.
//! `extract_reply` checks all four; a response matching none of them, or one
//! that yields only whitespace, is a provider failure rather than an empty
//! analysis.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{Completion, ProviderAdapter, ProviderConfig};
use crate::constants::llm;
use crate::types::{ErrorClassifier, RedpenError, Result};

const DEFAULT_API_BASE: &str = "https://api.minimax.chat/v1";
const DEFAULT_MODEL: &str = "abab6.5s-chat";
const DEFAULT_CONTEXT_LIMIT: usize = 1_000_000;
const TOP_P: f32 = 0.95;

/// MiniMax provider with secure API key handling
pub struct MiniMaxProvider {
    id: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    models: Vec<String>,
    context_limit_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for MiniMaxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniMaxProvider")
            .field("id", &self.id)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("models", &self.models)
            .field("context_limit_tokens", &self.context_limit_tokens)
            .finish()
    }
}

impl MiniMaxProvider {
    pub fn new(id: &str, config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.ok_or_else(|| {
            RedpenError::Config(format!("Provider '{}' has no API key configured", id))
        })?;

        let models = if config.models.is_empty() {
            vec![DEFAULT_MODEL.to_string()]
        } else {
            config.models
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RedpenError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            id: id.to_string(),
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            models,
            context_limit_tokens: config.context_limit_tokens.unwrap_or(DEFAULT_CONTEXT_LIMIT),
            client,
        })
    }
}

/// Pull the generated text out of whichever envelope MiniMax used.
///
/// Checked in order: `reply`, `text`, `content`, then
/// `choices[0].message.content`. Whitespace-only candidates are skipped so a
/// blank `reply` can still fall through to a populated `choices` array.
fn extract_reply(body: &Value) -> Option<String> {
    let direct_fields = ["reply", "text", "content"];
    for field in direct_fields {
        if let Some(text) = body.get(field).and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ProviderAdapter for MiniMaxProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "MiniMax"
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn context_limit_tokens(&self) -> usize {
        self.context_limit_tokens
    }

    async fn complete(&self, prompt: &str, model: &str, timeout: Duration) -> Result<Completion> {
        let start_time = Instant::now();
        let url = format!("{}/text/chatcompletion_pro", self.api_base);
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                sender_type: "USER".to_string(),
                sender_name: "user".to_string(),
                text: prompt.to_string(),
            }],
            bot_setting: vec![BotSetting {
                bot_name: "assistant".to_string(),
                content: "You are a professional manuscript editor.".to_string(),
            }],
            reply_constraints: ReplyConstraints {
                sender_type: "BOT".to_string(),
                sender_name: "assistant".to_string(),
            },
            temperature: llm::TEMPERATURE,
            top_p: TOP_P,
            tokens_to_generate: llm::MAX_AGGREGATION_TOKENS,
        };

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

        let body: Value = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), &self.id))?;

        // MiniMax reports some failures with HTTP 200 and a base_resp code
        if let Some(code) = body.pointer("/base_resp/status_code").and_then(Value::as_i64)
            && code != 0
        {
            let msg = body
                .pointer("/base_resp/status_msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!(provider = %self.id, code, msg, "API-level error");
            return Err(
                ErrorClassifier::classify(&format!("MiniMax error {}: {}", code, msg), &self.id)
                    .into(),
            );
        }

        let text = extract_reply(&body).ok_or_else(|| {
            ErrorClassifier::classify("Empty or unrecognized response shape", &self.id)
        })?;

        let tokens_used = body
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
            .map(|t| t as u32);

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
            tokens_used,
            elapsed,
        })
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    bot_setting: Vec<BotSetting>,
    reply_constraints: ReplyConstraints,
    temperature: f32,
    top_p: f32,
    tokens_to_generate: usize,
}

#[derive(Debug, Serialize)]
struct Message {
    sender_type: String,
    sender_name: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct BotSetting {
    bot_name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ReplyConstraints {
    sender_type: String,
    sender_name: String,
}
