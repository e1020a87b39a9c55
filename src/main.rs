use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chonker_highlight::cli::{self, HighlightArgs};
use chonker_highlight::config::HighlightConfig;
use chonker_highlight::error::SyncError;
use chonker_highlight::logging::{init_logging, LoggingConfig};
use chonker_highlight::overlay::SurfaceSize;
use chonker_highlight::pdf_viewer::ZoomMode;

#[derive(Parser)]
#[command(name = "chonker-highlight")]
#[command(about = "🐹 Sync extracted text with highlights over the rendered PDF")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload and summarize its fragment index
    Index {
        /// Extraction payload (JSON)
        payload: PathBuf,
    },

    /// Show the text panel for a payload
    Panel {
        payload: PathBuf,

        /// Mark this text as selected
        #[arg(short, long)]
        select: Option<String>,

        /// Show the formatted text instead of the per-page fragments
        #[arg(long)]
        formatted: bool,

        /// Wrap width
        #[arg(short, long, default_value_t = 80)]
        width: usize,
    },

    /// Select a text and report the navigations and highlight shapes
    Highlight {
        payload: PathBuf,

        /// Text to select
        #[arg(short, long)]
        text: String,

        /// Fixed viewport scale
        #[arg(long, conflicts_with = "zoom")]
        scale: Option<f64>,

        /// Zoom mode: page-fit, page-width, actual, or a factor
        #[arg(long)]
        zoom: Option<ZoomMode>,

        /// Page layer size in pixels
        #[arg(long, default_value = "1224x1584")]
        viewport: SurfaceSize,

        /// Page size in document units
        #[arg(long, default_value = "612x792")]
        page_size: SurfaceSize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to a file
    Init { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = HighlightConfig::load(cli.config.as_deref())?;
    let mut logging = LoggingConfig::from(config.logging.clone());
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let _log_guard = init_logging(&logging)?;

    let result = match cli.command {
        Commands::Index { payload } => cli::index_command(payload),
        Commands::Panel {
            payload,
            select,
            formatted,
            width,
        } => cli::panel_command(payload, select, formatted, width, &config),
        Commands::Highlight {
            payload,
            text,
            scale,
            zoom,
            viewport,
            page_size,
            json,
        } => cli::highlight_command(
            HighlightArgs {
                payload,
                text,
                scale,
                zoom,
                viewport,
                page_size,
                json,
            },
            &config,
        ),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::config_show_command(&config),
            ConfigAction::Init { path } => cli::config_init_command(path),
        },
    };

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<SyncError>() {
            chonker_highlight::log_error!(err, "command");
            eprintln!("{}", err.user_message());
        }
    }
    result
}
