//! Analyze Command
//!
//! Runs a manuscript analysis end to end: loads configuration, wires the
//! provider rotation, and prints (or writes) the final report.
//!
//! Usage:
//!   redpen analyze draft.txt --mode continuity
//!   redpen analyze draft.txt --mode character --reference characters.md
//!   redpen analyze draft.txt --instructions "Focus on act two" -o report.md

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ai::health::ProviderHealthTracker;
use crate::ai::provider::{Dispatcher, SharedProvider, create_provider};
use crate::analysis::{AnalysisEngine, AnalysisRequest, SupportingFile};
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::types::{EditingMode, RedpenError, Result};

pub struct AnalyzeOptions {
    pub manuscript: PathBuf,
    pub mode: EditingMode,
    pub references: Vec<PathBuf>,
    pub instructions: Option<String>,
    pub output: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

pub async fn run(options: AnalyzeOptions) -> Result<()> {
    let out = Output::new();

    let config = match &options.config_file {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let engine = build_engine(&config)?;
    let request = build_request(&options)?;

    out.info(&format!(
        "Analyzing {} ({} mode)",
        options.manuscript.display(),
        options.mode
    ));

    let report = engine.analyze(&request).await?;

    if let Some(output_path) = &options.output {
        fs::write(output_path, &report.feedback)?;
        out.success(&format!("Report written to {}", output_path.display()));
    } else {
        out.section("Analysis Report");
        println!("{}", report.feedback);
    }

    out.section("Details");
    let meta = &report.metadata;
    if let Some(provider) = &meta.provider {
        out.detail("provider", provider);
    }
    if let Some(model) = &meta.model {
        out.detail("model", model);
    }
    out.detail(
        "path",
        if meta.chunked {
            "chunked analysis"
        } else {
            "direct analysis"
        },
    );
    if meta.chunked {
        out.detail("chunks", &meta.chunks_processed.to_string());
    }
    out.detail(
        "manuscript size",
        &format!("~{} tokens", meta.total_tokens_estimated),
    );
    if meta.tokens_used > 0 {
        out.detail("tokens billed", &meta.tokens_used.to_string());
    }
    out.detail("elapsed", &format!("{:.1}s", meta.elapsed_ms as f64 / 1000.0));

    Ok(())
}

/// Wire the provider rotation and analysis engine from configuration
pub fn build_engine(config: &Config) -> Result<AnalysisEngine> {
    let mut providers: Vec<SharedProvider> = Vec::new();
    for entry in &config.providers {
        if entry.provider.api_key.is_none() {
            warn!(
                provider = %entry.id,
                "skipping provider without an API key (set {}_API_KEY)",
                entry.id.to_uppercase().replace('-', "_")
            );
            continue;
        }
        providers.push(create_provider(&entry.id, &entry.provider)?);
    }

    if providers.is_empty() {
        return Err(RedpenError::Config(
            "No usable providers configured. Add providers to the config and set their API keys."
                .to_string(),
        ));
    }
    debug!(count = providers.len(), "providers initialized");

    let health = Arc::new(ProviderHealthTracker::new());
    let dispatcher = Arc::new(
        Dispatcher::new(providers, health).with_retry_policy(config.retry.to_policy()),
    );

    let mut engine = AnalysisEngine::new(Arc::clone(&dispatcher))
        .with_chunking_config(config.chunking.clone())
        .with_direct_threshold(config.analysis.direct_threshold_tokens)
        .with_primary_safe_limit(config.analysis.primary_safe_limit_tokens)
        .with_aggregation_batch_size(config.analysis.aggregation_batch_size);

    if let Some(hc) = &config.high_context_provider {
        if dispatcher.provider(hc).is_some() {
            engine = engine.with_high_context_provider(hc.clone());
        } else {
            warn!(provider = %hc, "high-context provider is configured but unusable, skipping escalation");
        }
    }

    Ok(engine)
}

/// Read the manuscript and reference files into an analysis request
fn build_request(options: &AnalyzeOptions) -> Result<AnalysisRequest> {
    let manuscript = read_text_file(&options.manuscript)?;

    let mut request = AnalysisRequest::new(manuscript, options.mode);
    request.additional_instructions = options.instructions.clone();

    for path in &options.references {
        request.supporting_files.push(SupportingFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            content: read_text_file(path)?,
        });
    }

    Ok(request)
}

fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        RedpenError::Validation(format!("Cannot read {}: {}", path.display(), e))
    })
}
