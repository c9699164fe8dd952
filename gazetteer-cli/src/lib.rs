//! Command-line interface for installing and querying gazetteers.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use std::io::Write;
use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

mod error;
mod install;
mod lookup;

pub use error::CliError;

use install::{InstallArgs, run_install_with};
use lookup::{FindArgs, SearchArgs, run_find_with, run_search_with};

pub(crate) const ARG_CONFIG: &str = "config";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_DOWNLOADS: &str = "downloads";
pub(crate) const ARG_CHUNK_SIZE: &str = "chunk-size";
pub(crate) const ARG_KEEP_DOWNLOADS: &str = "keep-downloads";
pub(crate) const ARG_SPATIALITE: &str = "spatialite";
pub(crate) const ARG_SPATIALITE_DIR: &str = "spatialite-dir";
pub(crate) const ARG_GAZETTEER: &str = "gazetteer";
pub(crate) const ARG_NAME: &str = "name";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ARG_IDENTIFIER: &str = "identifier";

pub(crate) const ENV_INSTALL_CONFIG: &str = "GAZETTEER_CMDS_INSTALL_GAZETTEER_CONFIG";
pub(crate) const ENV_SEARCH_GAZETTEER: &str = "GAZETTEER_CMDS_SEARCH_GAZETTEER";
pub(crate) const ENV_SEARCH_NAME: &str = "GAZETTEER_CMDS_SEARCH_NAME";
pub(crate) const ENV_FIND_GAZETTEER: &str = "GAZETTEER_CMDS_FIND_GAZETTEER";
pub(crate) const ENV_FIND_IDENTIFIER: &str = "GAZETTEER_CMDS_FIND_IDENTIFIER";

/// Database file used when none is configured.
pub(crate) const DEFAULT_DATABASE: &str = "gazetteer.db";

/// Run the gazetteer CLI with the current process arguments and environment.
///
/// # Errors
/// Returns a [`CliError`] when argument parsing, configuration merging,
/// logging setup or the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.level())?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Install(args) => run_install_with(args, writer),
        Command::Search(args) => run_search_with(args, writer),
        Command::Find(args) => run_find_with(args, writer),
    }
}

fn init_logging(level: Level) -> Result<(), CliError> {
    LogTracer::init()?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Serialize `value` as a single JSON line.
pub(crate) fn write_json_line<T: serde::Serialize>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}

#[derive(Debug, Parser)]
#[command(
    name = "gazetteer",
    about = "Install gazetteers into SQLite and look up their features",
    version
)]
struct Cli {
    /// Log progress at INFO level.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log diagnostics at DEBUG level.
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    const fn level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.verbose {
            Level::INFO
        } else {
            Level::WARN
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install every source of a gazetteer configuration.
    Install(InstallArgs),
    /// Find features by exact name.
    Search(SearchArgs),
    /// Show the feature registered under an identifier.
    Find(FindArgs),
}

#[cfg(test)]
mod tests;
