//! # topic-cli
//!
//! CLI tool for exercising topicsync without a server.
//!
//! ## Commands
//!
//! - `replay`: Run a JSON script against an in-process topic and print the
//!   resulting messages, receipts and events
//! - `plan`: Show how a delete request is split between server and cache
//!
//! ## Example
//!
//! ```bash
//! # Replay a scripted session
//! topic-cli replay session.json
//!
//! # Plan a delete against a topic whose last seq is 20
//! topic-cli plan --max-seq 20 --range 1:5 --range 3:8 --range 10:
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use topicsync_client::TopicConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{plan, replay};

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "topic.toml";

/// CLI tool for exercising topicsync without a server.
#[derive(Parser, Debug)]
#[command(name = "topic-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Topic configuration file (default: ./topic.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON script against an in-process topic
    Replay {
        /// Script file (JSON array of operations)
        script: PathBuf,
    },

    /// Show how delete ranges are split and clipped
    Plan {
        /// Highest confirmed seq of the topic
        #[arg(long, default_value = "0")]
        max_seq: u64,

        /// Range to delete: low:hi, low: or all (repeatable)
        #[arg(long = "range", required = true)]
        ranges: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Commands::Replay { script } => {
            replay::run(&config, &script).await?;
        }
        Commands::Plan { max_seq, ranges } => {
            plan::run(&ranges, max_seq)?;
        }
    }

    Ok(())
}

/// Load the explicit config file, else `topic.toml` if present, else defaults.
fn load_config(path: Option<&Path>) -> Result<TopicConfig> {
    match path {
        Some(path) => TopicConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                TopicConfig::from_file(default).context("Failed to load topic.toml")
            } else {
                Ok(TopicConfig::default())
            }
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the configured filter.
fn init_logging(config: &TopicConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
