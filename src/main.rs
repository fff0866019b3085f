use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redpen::types::EditingMode;

/// Parse editing mode from string
fn parse_editing_mode(s: &str) -> Result<EditingMode, String> {
    EditingMode::from_str(s)
}

#[derive(Parser)]
#[command(name = "redpen")]
#[command(
    version,
    about = "Editorial manuscript analysis across free-tier LLM providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Use a specific config file instead of the resolution chain")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a manuscript
    Analyze {
        #[arg(help = "Path to the manuscript text file")]
        manuscript: PathBuf,

        #[arg(
            long,
            short,
            default_value = "proofread",
            value_parser = parse_editing_mode,
            help = "Editing mode: proofread, style, character, chapter, creative, continuity"
        )]
        mode: EditingMode,

        #[arg(long, short, help = "Reference file (character sheet, outline); repeatable")]
        reference: Vec<PathBuf>,

        #[arg(long, short, help = "Additional instructions for the analysis")]
        instructions: Option<String>,

        #[arg(long, short, help = "Write the report to a file instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mRedpen encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Analyze {
            manuscript,
            mode,
            reference,
            instructions,
            output,
        } => {
            use redpen::cli::commands::analyze::{AnalyzeOptions, run};

            let rt = Runtime::new()?;
            rt.block_on(run(AnalyzeOptions {
                manuscript,
                mode,
                references: reference,
                instructions,
                output,
                config_file: cli.config,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                redpen::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                redpen::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    redpen::cli::commands::config::init_global(force)?;
                } else {
                    redpen::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
