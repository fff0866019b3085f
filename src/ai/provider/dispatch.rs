//! Provider Dispatcher
//!
//! Single entry point for "get this prompt answered by someone". Orders
//! providers by observed health, walks each provider's model list, retries
//! transient faults in place, and rotates on rate limits and fatal errors.
//! Token-limit errors skip straight to the next model with no retry: the
//! same oversized input will never fit on a second attempt.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Completion, SharedProvider};
use crate::ai::health::ProviderHealthTracker;
use crate::ai::retry::{RetryPolicy, execute_with_retry};
use crate::types::{ErrorCategory, RedpenError, Result};

/// Health-ordered provider rotation
pub struct Dispatcher {
    providers: Vec<SharedProvider>,
    health: Arc<ProviderHealthTracker>,
    retry_policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(providers: Vec<SharedProvider>, health: Arc<ProviderHealthTracker>) -> Self {
        Self {
            providers,
            health,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// The health tracker shared with callers that log summaries
    pub fn health(&self) -> &Arc<ProviderHealthTracker> {
        &self.health
    }

    /// Look up a configured provider by id
    pub fn provider(&self, id: &str) -> Option<&SharedProvider> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Send a prompt through the provider rotation.
    ///
    /// Providers are tried in health order (skipping any in rate-limit
    /// cool-down); within a provider, models are tried in configured order.
    /// Returns the first successful completion, or
    /// [`RedpenError::AllProvidersExhausted`] when every combination failed.
    pub async fn dispatch(&self, prompt: &str) -> Result<Completion> {
        let request_id = Uuid::new_v4();
        let candidate_ids: Vec<&str> = self.providers.iter().map(|p| p.id()).collect();
        let ordered = self.health.ordered_providers(candidate_ids.iter().copied());

        if ordered.is_empty() {
            warn!(%request_id, "every provider is in rate-limit cool-down");
            return Err(RedpenError::AllProvidersExhausted);
        }

        debug!(%request_id, order = ?ordered, prompt_chars = prompt.len(), "dispatching");

        for provider_id in &ordered {
            let Some(provider) = self.provider(provider_id) else {
                continue;
            };

            match self.try_provider(provider, prompt, &request_id).await {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    debug!(%request_id, provider = %provider_id, error = %err, "provider exhausted, rotating");
                }
            }
        }

        warn!(%request_id, providers = ordered.len(), "all providers exhausted");
        Err(RedpenError::AllProvidersExhausted)
    }

    /// Send a prompt to one specific provider, bypassing rotation.
    ///
    /// Used for high-context escalation, where only one provider has the
    /// window to hold the prompt. Errors propagate to the caller so it can
    /// fall back to a different strategy.
    pub async fn dispatch_to(&self, provider_id: &str, prompt: &str) -> Result<Completion> {
        let request_id = Uuid::new_v4();
        let provider = self.provider(provider_id).ok_or_else(|| {
            RedpenError::Config(format!("Provider '{}' is not configured", provider_id))
        })?;

        if self.health.should_skip(provider_id) {
            return Err(RedpenError::AllProvidersExhausted);
        }

        debug!(%request_id, provider = %provider_id, prompt_chars = prompt.len(), "targeted dispatch");
        self.try_provider(provider, prompt, &request_id).await
    }

    /// Try every model on one provider, with retry, recording health outcomes
    async fn try_provider(
        &self,
        provider: &SharedProvider,
        prompt: &str,
        request_id: &Uuid,
    ) -> Result<Completion> {
        let provider_id = provider.id().to_string();
        let timeout = self.health.optimized_timeout(&provider_id);
        let mut last_error: Option<RedpenError> = None;

        for model in provider.models() {
            let op_name = format!("{}/{}", provider_id, model);
            let result = execute_with_retry(
                || provider.complete(prompt, model, timeout),
                &self.retry_policy,
                &op_name,
            )
            .await;

            match result {
                Ok(completion) => {
                    self.health.record_success(&provider_id, completion.elapsed);
                    info!(
                        %request_id,
                        provider = %provider_id,
                        model = %model,
                        elapsed_ms = completion.elapsed.as_millis() as u64,
                        "completion succeeded"
                    );
                    return Ok(completion);
                }
                Err(err) => match err.category() {
                    Some(ErrorCategory::RateLimit) => {
                        // Retry budget inside execute_with_retry is spent;
                        // the whole provider cools down, not just this model.
                        self.health.record_rate_limit(&provider_id);
                        warn!(%request_id, provider = %provider_id, "rate limited, rotating provider");
                        return Err(err);
                    }
                    Some(ErrorCategory::TokenLimit) => {
                        debug!(%request_id, provider = %provider_id, model = %model, "token limit, trying next model");
                        last_error = Some(err);
                    }
                    _ => {
                        self.health.record_failure(&provider_id);
                        warn!(%request_id, provider = %provider_id, model = %model, error = %err, "model failed");
                        last_error = Some(err);
                    }
                },
            }
        }

        Err(last_error.unwrap_or(RedpenError::AllProvidersExhausted))
    }
}
