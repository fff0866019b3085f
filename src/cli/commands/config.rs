//! Config Command
//!
//! Manage redpen configuration.
//!
//! Usage:
//!   redpen config show [-f json]
//!   redpen config path
//!   redpen config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show merged effective configuration
pub fn show(format: &str) -> Result<()> {
    ConfigLoader::show_config(format == "json")
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let out = Output::new();
    let dir = ConfigLoader::init_global(force)?;
    out.success("Initialized global configuration");
    out.detail("directory", &dir.display().to_string());
    if let Some(config_path) = ConfigLoader::global_config_path() {
        out.detail("config", &config_path.display().to_string());
    }
    out.info("Set provider API keys via environment variables (e.g. GROQ_API_KEY)");
    Ok(())
}

/// Initialize project configuration
pub fn init_project() -> Result<()> {
    let out = Output::new();
    let dir = ConfigLoader::init_project()?;
    out.success("Initialized project configuration");
    out.detail("directory", &dir.display().to_string());
    Ok(())
}
