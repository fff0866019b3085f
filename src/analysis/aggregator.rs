//! Chunk Result Aggregation
//!
//! Merges per-chunk analyses into one unified report, escalating strategy by
//! prompt size:
//!
//! 1. **Direct**: the combined prompt fits the primary provider class, so it
//!    goes through normal rotation.
//! 2. **High-context**: too big for the primaries, but one configured
//!    provider has a window large enough to hold it whole.
//! 3. **Multi-stage**: no single call can hold it. Chunk analyses are
//!    aggregated in batches, then the batch summaries are combined in a
//!    final pass that is itself size-checked.
//!
//! A single chunk analysis needs no aggregation at all and is returned
//! verbatim, costing zero LLM calls.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::provider::Dispatcher;
use crate::ai::tokenizer::{estimate_tokens, fits_budget};
use crate::analysis::prompts::build_aggregation_prompt;
use crate::constants::{aggregation, tokens};
use crate::types::{EditingMode, ErrorCategory, RedpenError, Result};

/// Which strategy produced the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStage {
    /// One chunk analysis, returned as-is
    SingleChunk,
    /// Combined prompt fit the primary providers
    Direct,
    /// Escalated to the high-context provider
    HighContext,
    /// Batched aggregation with a final combine pass
    MultiStage,
}

/// Aggregated report plus bookkeeping for metadata
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub feedback: String,
    pub stage: AggregationStage,
    /// Tokens billed across all aggregation calls, where reported
    pub tokens_used: u32,
    /// Provider and model of the final call, when one was made
    pub provider: Option<String>,
    pub model: Option<String>,
}

pub struct Aggregator {
    dispatcher: Arc<Dispatcher>,
    high_context_provider: Option<String>,
    primary_safe_limit: usize,
    batch_size: usize,
}

impl Aggregator {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            high_context_provider: None,
            primary_safe_limit: tokens::PRIMARY_SAFE_LIMIT,
            batch_size: aggregation::BATCH_SIZE,
        }
    }

    /// Provider to escalate to when the prompt outgrows the primaries
    pub fn with_high_context_provider(mut self, id: impl Into<String>) -> Self {
        self.high_context_provider = Some(id.into());
        self
    }

    pub fn with_primary_safe_limit(mut self, limit: usize) -> Self {
        self.primary_safe_limit = limit;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Merge chunk analyses (in chunk order) into one report
    pub async fn aggregate(
        &self,
        analyses: &[String],
        mode: EditingMode,
    ) -> Result<AggregationOutcome> {
        if analyses.is_empty() {
            return Err(RedpenError::Validation(
                "No chunk analyses to aggregate".to_string(),
            ));
        }

        if analyses.len() == 1 {
            debug!("single chunk analysis, no aggregation needed");
            return Ok(AggregationOutcome {
                feedback: analyses[0].clone(),
                stage: AggregationStage::SingleChunk,
                tokens_used: 0,
                provider: None,
                model: None,
            });
        }

        let prompt = build_aggregation_prompt(analyses, mode);
        let estimate = estimate_tokens(&prompt);
        info!(
            chunks = analyses.len(),
            estimated_tokens = estimate,
            "aggregating chunk analyses"
        );

        if estimate <= self.primary_safe_limit {
            let completion = self.dispatcher.dispatch(&prompt).await?;
            return Ok(AggregationOutcome {
                feedback: completion.text,
                stage: AggregationStage::Direct,
                tokens_used: completion.tokens_used.unwrap_or(0),
                provider: Some(completion.provider),
                model: Some(completion.model),
            });
        }

        // Too big for the primaries: try holding it whole on the
        // high-context provider before resorting to batching
        if let Some(hc) = self.high_context_fitting(estimate) {
            match self.dispatcher.dispatch_to(&hc, &prompt).await {
                Ok(completion) => {
                    return Ok(AggregationOutcome {
                        feedback: completion.text,
                        stage: AggregationStage::HighContext,
                        tokens_used: completion.tokens_used.unwrap_or(0),
                        provider: Some(completion.provider),
                        model: Some(completion.model),
                    });
                }
                Err(err) => {
                    warn!(provider = %hc, error = %err, "high-context escalation failed, falling back to multi-stage");
                }
            }
        }

        self.aggregate_multi_stage(analyses, mode).await
    }

    /// The configured high-context provider, if the estimate fits its window
    fn high_context_fitting(&self, estimate: usize) -> Option<String> {
        let hc = self.high_context_provider.as_deref()?;
        let limit = self
            .dispatcher
            .provider(hc)
            .map(|p| p.context_limit_tokens())
            .unwrap_or(tokens::HIGH_CONTEXT_LIMIT);
        (estimate <= limit).then(|| hc.to_string())
    }

    /// Route one aggregation call by prompt size
    async fn dispatch_sized(&self, prompt: &str) -> Result<crate::ai::provider::Completion> {
        if fits_budget(prompt, self.primary_safe_limit) {
            return self.dispatcher.dispatch(prompt).await;
        }
        let estimate = estimate_tokens(prompt);
        if let Some(hc) = self.high_context_fitting(estimate) {
            return self.dispatcher.dispatch_to(&hc, prompt).await;
        }
        Err(RedpenError::llm(
            ErrorCategory::TokenLimit,
            format!(
                "Aggregation prompt ({} tokens) exceeds every configured context window",
                estimate
            ),
        ))
    }

    async fn aggregate_multi_stage(
        &self,
        analyses: &[String],
        mode: EditingMode,
    ) -> Result<AggregationOutcome> {
        let batch_count = analyses.len().div_ceil(self.batch_size);
        info!(
            chunks = analyses.len(),
            batches = batch_count,
            batch_size = self.batch_size,
            "multi-stage aggregation"
        );

        let mut tokens_used = 0u32;
        let mut batch_summaries = Vec::with_capacity(batch_count);

        for (i, batch) in analyses.chunks(self.batch_size).enumerate() {
            let batch_prompt = build_aggregation_prompt(batch, mode);
            let completion = self
                .dispatch_sized(&batch_prompt)
                .await
                .map_err(|e| RedpenError::Aggregation {
                    batch: i + 1,
                    reason: e.to_string(),
                })?;

            debug!(batch = i + 1, of = batch_count, "batch aggregated");
            tokens_used += completion.tokens_used.unwrap_or(0);
            batch_summaries.push(completion.text);
        }

        if batch_summaries.len() == 1 {
            // chunks() yielded one batch; its summary is the report. Can
            // happen when the high-context escalation failed, not because of
            // prompt size.
            let feedback = batch_summaries
                .pop()
                .unwrap_or_default();
            return Ok(AggregationOutcome {
                feedback,
                stage: AggregationStage::MultiStage,
                tokens_used,
                provider: None,
                model: None,
            });
        }

        // Final combine pass, itself routed by size
        let final_prompt = build_aggregation_prompt(&batch_summaries, mode);
        let completion = self.dispatch_sized(&final_prompt).await?;
        tokens_used += completion.tokens_used.unwrap_or(0);

        Ok(AggregationOutcome {
            feedback: completion.text,
            stage: AggregationStage::MultiStage,
            tokens_used,
            provider: Some(completion.provider),
            model: Some(completion.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::health::ProviderHealthTracker;
    use crate::ai::provider::{Completion, ProviderAdapter, SharedProvider};
    use crate::types::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct MockProvider {
        id: String,
        models: Vec<String>,
        context_limit: usize,
        script: Mutex<VecDeque<Result<String>>>,
        calls: AtomicU32,
    }

    impl MockProvider {
        fn new(id: &str, context_limit: usize, script: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                models: vec!["mock-model".to_string()],
                context_limit,
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProvider {
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
            self.context_limit
        }

        async fn complete(
            &self,
            _prompt: &str,
            model: &str,
            _timeout: Duration,
        ) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let text = match next {
                Some(Ok(text)) => text,
                Some(Err(err)) => return Err(err),
                None => "combined report".to_string(),
            };
            Ok(Completion {
                text,
                model: model.to_string(),
                provider: self.id.clone(),
                tokens_used: Some(100),
                elapsed: Duration::from_millis(40),
            })
        }
    }

    fn aggregator_over(providers: Vec<SharedProvider>) -> Aggregator {
        let dispatcher = Arc::new(Dispatcher::new(
            providers,
            Arc::new(ProviderHealthTracker::new()),
        ));
        Aggregator::new(dispatcher)
    }

    fn analyses(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("finding {}", i)).collect()
    }

    #[tokio::test]
    async fn test_empty_input_is_validation_error() {
        let agg = aggregator_over(vec![MockProvider::new("groq", 8_192, vec![])]);
        let err = agg
            .aggregate(&[], EditingMode::Proofread)
            .await
            .unwrap_err();
        assert!(matches!(err, RedpenError::Validation(_)));
    }

    #[tokio::test]
    async fn test_single_analysis_returned_verbatim() {
        let groq = MockProvider::new("groq", 8_192, vec![]);
        let agg = aggregator_over(vec![groq.clone()]);

        let outcome = agg
            .aggregate(&analyses(1), EditingMode::Style)
            .await
            .unwrap();

        assert_eq!(outcome.stage, AggregationStage::SingleChunk);
        assert_eq!(outcome.feedback, "finding 1");
        assert_eq!(outcome.tokens_used, 0);
        assert_eq!(groq.call_count(), 0);
    }

    #[tokio::test]
    async fn test_small_prompt_aggregates_directly() {
        let groq = MockProvider::new("groq", 8_192, vec![Ok("unified report".to_string())]);
        let agg = aggregator_over(vec![groq.clone()]);

        let outcome = agg
            .aggregate(&analyses(3), EditingMode::Proofread)
            .await
            .unwrap();

        assert_eq!(outcome.stage, AggregationStage::Direct);
        assert_eq!(outcome.feedback, "unified report");
        assert_eq!(outcome.provider.as_deref(), Some("groq"));
        assert_eq!(groq.call_count(), 1);
    }

    #[tokio::test]
    async fn test_oversized_prompt_escalates_to_high_context() {
        let groq = MockProvider::new("groq", 8_192, vec![]);
        let minimax = MockProvider::new("minimax", 1_000_000, vec![Ok("big report".to_string())]);
        let agg = aggregator_over(vec![groq.clone(), minimax.clone()])
            .with_primary_safe_limit(300)
            .with_high_context_provider("minimax");

        let outcome = agg
            .aggregate(&analyses(20), EditingMode::Continuity)
            .await
            .unwrap();

        assert_eq!(outcome.stage, AggregationStage::HighContext);
        assert_eq!(outcome.provider.as_deref(), Some("minimax"));
        assert_eq!(groq.call_count(), 0);
        assert_eq!(minimax.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_escalation_falls_back_to_multi_stage() {
        let groq = MockProvider::new("groq", 8_192, vec![]);
        let minimax = MockProvider::new(
            "minimax",
            1_000_000,
            vec![Err(RedpenError::Llm(LlmError::with_provider(
                ErrorCategory::Unknown,
                "empty response",
                "minimax",
            )))],
        );
        // Batches of 8 keep each batch prompt under the primary limit
        let agg = aggregator_over(vec![groq.clone(), minimax.clone()])
            .with_primary_safe_limit(2_000)
            .with_high_context_provider("minimax")
            .with_batch_size(8);

        // ~500 chars per analysis pushes the combined prompt well past the
        // primary limit while each 8-analysis batch still fits
        let input: Vec<String> = (1..=20)
            .map(|i| format!("finding {}: {}", i, "x".repeat(500)))
            .collect();

        let outcome = agg.aggregate(&input, EditingMode::Style).await.unwrap();

        assert_eq!(outcome.stage, AggregationStage::MultiStage);
        assert_eq!(outcome.feedback, "combined report");
        assert_eq!(minimax.call_count(), 1);
        // Three batches (8 + 8 + 4) plus the final combine
        assert_eq!(groq.call_count(), 4);
    }

    #[tokio::test]
    async fn test_multi_stage_batches_and_final_combine() {
        let groq = MockProvider::new(
            "groq",
            8_192,
            vec![
                Ok("batch one summary".to_string()),
                Ok("batch two summary".to_string()),
                Ok("batch three summary".to_string()),
                Ok("final unified report".to_string()),
            ],
        );
        // 120 analyses, batch size 50: 50 + 50 + 20, then one combine pass
        let agg = aggregator_over(vec![groq.clone()]).with_primary_safe_limit(900);

        let outcome = agg
            .aggregate(&analyses(120), EditingMode::Chapter)
            .await
            .unwrap();

        assert_eq!(outcome.stage, AggregationStage::MultiStage);
        assert_eq!(outcome.feedback, "final unified report");
        assert_eq!(groq.call_count(), 4);
        assert_eq!(outcome.tokens_used, 400);
    }

    #[tokio::test]
    async fn test_batch_failure_aborts_with_batch_number() {
        let groq = MockProvider::new(
            "groq",
            8_192,
            vec![
                Ok("batch one summary".to_string()),
                Err(RedpenError::Llm(LlmError::with_provider(
                    ErrorCategory::Auth,
                    "key revoked",
                    "groq",
                ))),
            ],
        );
        let agg = aggregator_over(vec![groq.clone()]).with_primary_safe_limit(900);

        let err = agg
            .aggregate(&analyses(120), EditingMode::Proofread)
            .await
            .unwrap_err();

        match err {
            RedpenError::Aggregation { batch, .. } => assert_eq!(batch, 2),
            other => panic!("expected aggregation error, got {other}"),
        }
        // Batch 3 was never attempted
        assert_eq!(groq.call_count(), 2);
    }
}
