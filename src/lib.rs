//! Redpen - Resilient LLM Manuscript Analysis
//!
//! An editorial analysis engine that runs book-length manuscripts through
//! free-tier LLM providers without falling over when they do. Providers are
//! tried in health order with per-model fallback, transient faults retry
//! with jittered backoff, rate limits trigger cool-downs and rotation, and
//! manuscripts too large for any context window are chunked along chapter
//! and paragraph boundaries and re-aggregated into one report.
//!
//! ## Core Features
//!
//! - **Provider Rotation**: health-ordered fallback across any number of
//!   OpenAI-compatible providers plus MiniMax
//! - **Boundary-Aware Chunking**: chapter > paragraph > sentence break
//!   preference with overlap for context continuity
//! - **Escalating Aggregation**: direct, high-context, or multi-stage
//!   batched aggregation depending on prompt size
//! - **Six Editing Modes**: proofread, style, character, chapter, creative,
//!   continuity
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use redpen::ai::{Dispatcher, ProviderHealthTracker, create_provider};
//! use redpen::analysis::{AnalysisEngine, AnalysisRequest};
//! use redpen::types::EditingMode;
//!
//! let providers = vec![create_provider("groq", &groq_config)?];
//! let dispatcher = Arc::new(Dispatcher::new(
//!     providers,
//!     Arc::new(ProviderHealthTracker::new()),
//! ));
//! let engine = AnalysisEngine::new(dispatcher);
//! let report = engine
//!     .analyze(&AnalysisRequest::new(manuscript, EditingMode::Continuity))
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider adapters, dispatch, health tracking, retry, tokens
//! - [`analysis`]: chunking, prompts, aggregation, and the engine
//! - [`config`]: layered configuration loading
//! - [`cli`]: command implementations

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod constants;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::{ErrorCategory, LlmError, RedpenError, Result};

// Editing Modes
pub use types::EditingMode;

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use analysis::{AnalysisEngine, AnalysisReport, AnalysisRequest, SupportingFile};

pub use ai::{
    Completion,
    Dispatcher,
    ProviderAdapter,
    ProviderHealthTracker,
    RetryPolicy,
    create_provider,
};
