//! Command-line interface for `cms-migrate`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::config::Config;
use crate::logging;

/// `cms-migrate` - Export and import CMS content between instances.
#[derive(Parser, Debug)]
#[command(name = "cms-migrate")]
#[command(
    author,
    version,
    about = "Export and import CMS content and media between instances",
    long_about = None,
    after_help = "Media is deduplicated by content hash; media references are remapped to destination ids."
)]
pub struct Cli {
    /// Backend project directory
    #[arg(long, global = true, env = "CMS_MIGRATE_PROJECT", default_value = ".")]
    pub project: PathBuf,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export content types and their media into a .tar.gz archive
    Export(ExportArgs),

    /// Import an export archive, folder or URL into the project
    Import(ImportArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Content-type uids to export (e.g. api::article.article)
    pub types: Vec<String>,

    /// Export every api:: content type
    #[arg(long)]
    pub all: bool,

    /// Export api:: types whose collection name matches this regex
    #[arg(long, value_name = "REGEX")]
    pub filter_api: Option<String>,

    /// Export api:: types using a component whose collection name matches this regex
    #[arg(long, value_name = "REGEX")]
    pub filter_components: Option<String>,

    /// Report what would be exported without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output directory (overrides config)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ImportArgs {
    /// Archive (.tar.gz, .tgz, .tar), extracted export folder, or http(s) URL
    pub input: String,

    /// Delete the archive's content from the project instead of importing
    #[arg(long)]
    pub clean: bool,

    /// Leave schema files untouched
    #[arg(long)]
    pub skip_schema: bool,

    /// Only reuse media already present (matched by hash); copy nothing
    #[arg(long)]
    pub skip_media: bool,

    /// Report what would be imported without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command fails.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.project).context("Failed to load configuration")?;
    logging::init_logging(cli.verbose, cli.quiet, config.log_file.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    match cli.command {
        Commands::Export(args) => {
            disclaimer();
            commands::export::execute(&args, &config)
        }
        Commands::Import(args) => {
            disclaimer();
            commands::import::execute(&args, &config)
        }
        Commands::Version => {
            commands::version::execute();
            Ok(())
        }
    }
}

fn disclaimer() {
    warn!("This tool is provided as is, without warranty. Always back up your data before exporting or importing.");
}
