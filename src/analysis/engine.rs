//! Analysis Engine
//!
//! Orchestrates a full manuscript analysis: sizes the manuscript, picks the
//! direct or chunked path, runs chunk analyses sequentially (keeping
//! pressure off already-strained free-tier providers), and hands the chunk
//! results to the aggregator. Any chunk failure aborts the run; a partial
//! report silently missing part of the manuscript is worse than no report.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::ai::provider::Dispatcher;
use crate::ai::tokenizer::estimate_tokens;
use crate::analysis::aggregator::Aggregator;
use crate::analysis::chunker::{ChunkingConfig, ChunkingStats, chunk_manuscript, detect_chapters};
use crate::analysis::prompts::{SupportingFile, build_chunk_prompt, build_direct_prompt};
use crate::constants::tokens;
use crate::types::{EditingMode, RedpenError, Result};

/// Everything needed to analyze one manuscript
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub manuscript: String,
    pub mode: EditingMode,
    /// Reference documents (character sheets, outlines)
    pub supporting_files: Vec<SupportingFile>,
    /// Author's free-form requests, appended to the prompt
    pub additional_instructions: Option<String>,
}

impl AnalysisRequest {
    pub fn new(manuscript: impl Into<String>, mode: EditingMode) -> Self {
        Self {
            manuscript: manuscript.into(),
            mode,
            supporting_files: Vec::new(),
            additional_instructions: None,
        }
    }
}

/// How the report was produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub mode: EditingMode,
    /// Provider and model of the final call, when identifiable
    pub provider: Option<String>,
    pub model: Option<String>,
    pub chunked: bool,
    pub chunks_processed: usize,
    /// Manuscript size estimate that drove the path decision
    pub total_tokens_estimated: usize,
    /// Tokens billed across all calls, where providers reported usage
    pub tokens_used: u32,
    pub elapsed_ms: u64,
}

/// Final analysis output
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub feedback: String,
    pub metadata: AnalysisMetadata,
}

pub struct AnalysisEngine {
    dispatcher: Arc<Dispatcher>,
    aggregator: Aggregator,
    chunking: ChunkingConfig,
    direct_threshold: usize,
}

impl AnalysisEngine {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let aggregator = Aggregator::new(Arc::clone(&dispatcher));
        Self {
            dispatcher,
            aggregator,
            chunking: ChunkingConfig::default(),
            direct_threshold: tokens::DIRECT_ANALYSIS_THRESHOLD,
        }
    }

    pub fn with_chunking_config(mut self, config: ChunkingConfig) -> Self {
        self.chunking = config;
        self
    }

    pub fn with_direct_threshold(mut self, threshold: usize) -> Self {
        self.direct_threshold = threshold;
        self
    }

    /// Provider used when aggregation prompts outgrow the primaries
    pub fn with_high_context_provider(mut self, id: impl Into<String>) -> Self {
        self.aggregator = self.aggregator.with_high_context_provider(id);
        self
    }

    /// Aggregation prompts at or under this estimate stay on the rotation
    pub fn with_primary_safe_limit(mut self, limit: usize) -> Self {
        self.aggregator = self.aggregator.with_primary_safe_limit(limit);
        self
    }

    /// Chunk analyses per batch in multi-stage aggregation
    pub fn with_aggregation_batch_size(mut self, size: usize) -> Self {
        self.aggregator = self.aggregator.with_batch_size(size);
        self
    }

    /// Analyze a manuscript end to end
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        if request.manuscript.trim().is_empty() {
            return Err(RedpenError::Validation(
                "Manuscript must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let total_tokens_estimated = estimate_tokens(&request.manuscript);
        info!(
            mode = %request.mode,
            estimated_tokens = total_tokens_estimated,
            threshold = self.direct_threshold,
            "starting analysis"
        );

        if total_tokens_estimated <= self.direct_threshold {
            self.analyze_direct(request, total_tokens_estimated, started)
                .await
        } else {
            self.analyze_chunked(request, total_tokens_estimated, started)
                .await
        }
    }

    async fn analyze_direct(
        &self,
        request: &AnalysisRequest,
        total_tokens_estimated: usize,
        started: Instant,
    ) -> Result<AnalysisReport> {
        let prompt = build_direct_prompt(
            &request.manuscript,
            request.mode,
            &request.supporting_files,
            request.additional_instructions.as_deref(),
        );

        let completion = self.dispatcher.dispatch(&prompt).await?;

        Ok(AnalysisReport {
            feedback: completion.text,
            metadata: AnalysisMetadata {
                mode: request.mode,
                provider: Some(completion.provider),
                model: Some(completion.model),
                chunked: false,
                chunks_processed: 0,
                total_tokens_estimated,
                tokens_used: completion.tokens_used.unwrap_or(0),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    async fn analyze_chunked(
        &self,
        request: &AnalysisRequest,
        total_tokens_estimated: usize,
        started: Instant,
    ) -> Result<AnalysisReport> {
        let chunks = chunk_manuscript(&request.manuscript, &self.chunking)?;
        let stats = ChunkingStats::from_chunks(&chunks, detect_chapters(&request.manuscript).len());
        info!(
            chunks = chunks.len(),
            avg_chars = stats.avg_chunk_chars,
            chapters = stats.chapters_detected,
            "manuscript requires chunked analysis"
        );

        let mut tokens_used = 0u32;
        let mut analyses = Vec::with_capacity(chunks.len());

        // Sequential on purpose: parallel chunk fan-out turns one manuscript
        // into an instant rate-limit storm on free tiers
        for chunk in &chunks {
            let prompt = build_chunk_prompt(chunk, chunks.len(), request.mode);
            debug!(chunk = chunk.index + 1, of = chunks.len(), "analyzing chunk");

            let completion = self.dispatcher.dispatch(&prompt).await?;
            tokens_used += completion.tokens_used.unwrap_or(0);
            analyses.push(completion.text);
        }

        let outcome = self.aggregator.aggregate(&analyses, request.mode).await?;
        tokens_used += outcome.tokens_used;

        debug!("{}", self.dispatcher.health().summary());
        info!(
            chunks = chunks.len(),
            stage = ?outcome.stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chunked analysis complete"
        );

        Ok(AnalysisReport {
            feedback: outcome.feedback,
            metadata: AnalysisMetadata {
                mode: request.mode,
                provider: outcome.provider,
                model: outcome.model,
                chunked: true,
                chunks_processed: chunks.len(),
                total_tokens_estimated,
                tokens_used,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::health::ProviderHealthTracker;
    use crate::ai::provider::{Completion, ProviderAdapter, SharedProvider};
    use crate::types::{ErrorCategory, LlmError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct MockProvider {
        id: String,
        models: Vec<String>,
        script: Mutex<VecDeque<Result<String>>>,
        calls: AtomicU32,
    }

    impl MockProvider {
        fn new(id: &str, script: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                models: vec!["mock-model".to_string()],
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
            8_192
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
                None => "analysis feedback".to_string(),
            };
            Ok(Completion {
                text,
                model: model.to_string(),
                provider: self.id.clone(),
                tokens_used: Some(100),
                elapsed: Duration::from_millis(30),
            })
        }
    }

    fn engine_over(providers: Vec<SharedProvider>) -> AnalysisEngine {
        let dispatcher = Arc::new(Dispatcher::new(
            providers,
            Arc::new(ProviderHealthTracker::new()),
        ));
        AnalysisEngine::new(dispatcher)
    }

    fn long_manuscript() -> String {
        "The galley drifted onward. ".repeat(100)
    }

    #[tokio::test]
    async fn test_empty_manuscript_is_validation_error() {
        let engine = engine_over(vec![MockProvider::new("groq", vec![])]);
        let err = engine
            .analyze(&AnalysisRequest::new("  \n ", EditingMode::Proofread))
            .await
            .unwrap_err();
        assert!(matches!(err, RedpenError::Validation(_)));
    }

    #[tokio::test]
    async fn test_short_manuscript_takes_direct_path() {
        let groq = MockProvider::new("groq", vec![Ok("direct report".to_string())]);
        let engine = engine_over(vec![groq.clone()]);

        let report = engine
            .analyze(&AnalysisRequest::new(
                "A quiet morning. Nothing stirred.",
                EditingMode::Style,
            ))
            .await
            .unwrap();

        assert_eq!(report.feedback, "direct report");
        assert!(!report.metadata.chunked);
        assert_eq!(report.metadata.chunks_processed, 0);
        assert_eq!(report.metadata.provider.as_deref(), Some("groq"));
        assert_eq!(groq.call_count(), 1);
    }

    #[tokio::test]
    async fn test_long_manuscript_is_chunked_and_aggregated() {
        let groq = MockProvider::new("groq", vec![]);
        let engine = engine_over(vec![groq.clone()])
            .with_direct_threshold(100)
            .with_chunking_config(ChunkingConfig {
                max_chars: 800,
                overlap_chars: 50,
                deviation_fraction: 0.1,
            });

        let report = engine
            .analyze(&AnalysisRequest::new(long_manuscript(), EditingMode::Continuity))
            .await
            .unwrap();

        assert!(report.metadata.chunked);
        assert!(report.metadata.chunks_processed >= 2);
        // One call per chunk plus the aggregation pass
        assert_eq!(
            groq.call_count() as usize,
            report.metadata.chunks_processed + 1
        );
        assert_eq!(
            report.metadata.tokens_used,
            groq.call_count() * 100
        );
        assert_eq!(report.feedback, "analysis feedback");
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_run() {
        let groq = MockProvider::new(
            "groq",
            vec![
                Ok("chunk one analysis".to_string()),
                Err(RedpenError::Llm(LlmError::with_provider(
                    ErrorCategory::Auth,
                    "key revoked",
                    "groq",
                ))),
            ],
        );
        let engine = engine_over(vec![groq.clone()])
            .with_direct_threshold(100)
            .with_chunking_config(ChunkingConfig {
                max_chars: 800,
                overlap_chars: 50,
                deviation_fraction: 0.1,
            });

        let result = engine
            .analyze(&AnalysisRequest::new(long_manuscript(), EditingMode::Proofread))
            .await;

        assert!(result.is_err());
        // Later chunks were never attempted
        assert_eq!(groq.call_count(), 2);
    }

    #[tokio::test]
    async fn test_direct_path_carries_author_instructions() {
        let groq = MockProvider::new("groq", vec![]);
        let engine = engine_over(vec![groq.clone()]);

        let mut request = AnalysisRequest::new("Short text.", EditingMode::Creative);
        request.additional_instructions = Some("Keep the tone wry".to_string());
        request.supporting_files.push(SupportingFile {
            name: "outline.md".to_string(),
            content: "Act one: departure".to_string(),
        });

        let report = engine.analyze(&request).await.unwrap();
        assert_eq!(report.feedback, "analysis feedback");
        assert_eq!(groq.call_count(), 1);
    }
}
