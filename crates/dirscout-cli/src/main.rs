//! # dirscout CLI
//!
//! Command-line interface for locating named directories and files in large
//! synced trees.
//!
//! ## Commands
//!
//! - `dirscout resolve` - Resolve the configured (or given) targets
//! - `dirscout status` - Show directory cache status
//! - `dirscout invalidate` - Delete the directory cache
//! - `dirscout refresh` - Invalidate and resolve again
//! - `dirscout set-path` - Point a target at a path by hand
//! - `dirscout index build|lookup|status` - Manage the fuzzy file index
//!
//! ## Example Usage
//!
//! ```bash
//! # Resolve every configured target under the discovered sync root
//! dirscout resolve
//!
//! # Resolve one ad-hoc target under an explicit root
//! dirscout resolve --root /data/share --target LAB=Registro\ LAB.xlsx
//!
//! # Find the workbook for test 53 of 2018
//! dirscout index lookup 53 --year 18
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// dirscout - find named folders and files in huge synced trees
#[derive(Parser)]
#[command(name = "dirscout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory cache file (overrides DIRSCOUT_CACHE_FILE and the config)
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve targets to paths
    Resolve {
        /// Root to search under (default: discovered sync root)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Ad-hoc target as NAME=LITERAL (can be used multiple times)
        #[arg(short, long = "target", value_name = "NAME=LITERAL")]
        targets: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show directory cache status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Delete the directory cache
    Invalidate {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Invalidate the cache and resolve the configured targets again
    Refresh {
        /// Root to search under (default: discovered sync root)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Set the path of a configured target by hand
    SetPath {
        /// Logical target name (e.g. LAB_REGISTRY_FILE)
        name: String,

        /// Existing directory or file
        path: PathBuf,
    },

    /// Manage the fuzzy file index
    #[command(subcommand)]
    Index(IndexCommand),
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Build the index
    Build {
        /// Directory to index (default: the resolved index root target)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Rebuild even if the index is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Find the best file for an identifier
    Lookup {
        /// Identifier, e.g. 53 or 053
        id: String,

        /// Preferred year, two or four digits
        #[arg(short, long)]
        year: Option<String>,

        /// Directory to index (default: the resolved index root target)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// List every candidate, not just the best one
        #[arg(short, long)]
        all: bool,
    },

    /// Show index status
    Status {
        /// Directory to index (default: the resolved index root target)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => dirscout_core::Config::load_from(path)?,
        None => dirscout_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .init();

    let app = app::App::new(config, cli.cache_file.as_deref())?;

    // Execute command
    match cli.command {
        Commands::Resolve {
            root,
            targets,
            output,
        } => commands::resolve::run(&app, root, &targets, output),
        Commands::Status { output } => commands::status::run(&app, output),
        Commands::Invalidate { yes } => commands::invalidate::run(&app, yes),
        Commands::Refresh { root, output } => commands::refresh::run(&app, root, output),
        Commands::SetPath { name, path } => commands::set_path::run(&app, &name, &path),
        Commands::Index(IndexCommand::Build { root, force }) => {
            commands::index::build(&app, root, force)
        }
        Commands::Index(IndexCommand::Lookup {
            id,
            year,
            root,
            all,
        }) => commands::index::lookup(&app, root, &id, year.as_deref(), all),
        Commands::Index(IndexCommand::Status { root, output }) => {
            commands::index::status(&app, root, output)
        }
    }
}
