//! Manuscript Analysis Pipeline
//!
//! Chunking, prompt construction, aggregation, and the orchestrating engine.

pub mod aggregator;
pub mod chunker;
pub mod engine;
pub mod prompts;

pub use aggregator::{AggregationOutcome, AggregationStage, Aggregator};
pub use chunker::{
    ChapterInfo, ChunkingConfig, ChunkingStats, ManuscriptChunk, chunk_manuscript,
};
pub use engine::{AnalysisEngine, AnalysisMetadata, AnalysisReport, AnalysisRequest};
pub use prompts::SupportingFile;
