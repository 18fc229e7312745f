use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cellscope::{cli, config, logging, web};

#[derive(Debug, Parser)]
#[command(name = "cellscope")]
#[command(about = "Blood cell detection dashboard: model metrics and image/video analysis")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the model's evaluation metrics
    Metrics {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
        /// Read metrics from a local JSON file instead of the service
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Submit an image or video for cell detection
    Analyze {
        /// The image or video to analyze
        file: PathBuf,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
        /// Write the annotated image to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Serve the local web dashboard
    Web {
        /// Listen address (default from config: 127.0.0.1:9747)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Check detection service reachability and config
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config to ~/.cellscope/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `service.base_url`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    let config = config::load();
    logging::init(&config.logging.level);

    match app.command {
        Commands::Metrics { format, file } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_metrics(&config, fmt, file.as_deref())
        }
        Commands::Analyze { file, format, save } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_analyze(&config, &file, fmt, save.as_deref())
        }
        Commands::Web { addr } => {
            let addr = addr.unwrap_or_else(|| config.web.addr.clone());
            web::serve(config, &addr)
        }
        Commands::Health => cli::run_health(&config),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
