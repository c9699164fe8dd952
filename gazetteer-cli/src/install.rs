//! Install command implementation for the gazetteer CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gazetteer_data::{
    DEFAULT_CHUNK_SIZE, InstallReport, Installer, InstallerSettings, Store, StoreOptions,
    resolve_spatialite,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::num::NonZeroUsize;

use crate::{
    ARG_CHUNK_SIZE, ARG_CONFIG, ARG_DATABASE, ARG_DOWNLOADS, ARG_KEEP_DOWNLOADS, ARG_SPATIALITE,
    ARG_SPATIALITE_DIR, CliError, DEFAULT_DATABASE, ENV_INSTALL_CONFIG, write_json_line,
};

const DEFAULT_DOWNLOADS: &str = "downloads";

/// CLI arguments for the `install` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Install every source listed in a gazetteer YAML document: \
                 download or copy its file, stage it into SQLite, build the \
                 configured view and indexes, and register its features and \
                 names. Settings can come from CLI flags, configuration \
                 files, or environment variables.",
    about = "Install a gazetteer from its YAML configuration"
)]
#[ortho_config(prefix = "GAZETTEER")]
pub(crate) struct InstallArgs {
    /// Path to the gazetteer YAML document.
    #[arg(long = ARG_CONFIG, value_name = "yaml")]
    #[serde(default)]
    pub(crate) gazetteer_config: Option<Utf8PathBuf>,
    /// SQLite database to install into.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Root directory for downloaded source files.
    #[arg(long = ARG_DOWNLOADS, value_name = "dir")]
    #[serde(default)]
    pub(crate) downloads: Option<Utf8PathBuf>,
    /// Rows inserted per transaction while staging tabular files.
    #[arg(long = ARG_CHUNK_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) chunk_size: Option<NonZeroUsize>,
    /// Keep the gazetteer's downloads directory after a successful install.
    #[arg(long = ARG_KEEP_DOWNLOADS)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) keep_downloads: bool,
    /// Path to the SpatiaLite extension library.
    #[arg(long = ARG_SPATIALITE, value_name = "path")]
    #[serde(default)]
    pub(crate) spatialite: Option<Utf8PathBuf>,
    /// Directory holding per-platform SpatiaLite builds.
    #[arg(long = ARG_SPATIALITE_DIR, value_name = "dir", conflicts_with = ARG_SPATIALITE)]
    #[serde(default)]
    pub(crate) spatialite_dir: Option<Utf8PathBuf>,
}

impl InstallArgs {
    pub(crate) fn into_config(self) -> Result<InstallConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        InstallConfig::try_from(merged)
    }
}

/// Where the SpatiaLite extension comes from, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SpatialiteSource {
    /// Open plain SQLite.
    Disabled,
    /// Load this library.
    Library(Utf8PathBuf),
    /// Pick the build for the running platform under this directory.
    Directory(Utf8PathBuf),
}

impl SpatialiteSource {
    pub(crate) fn store_options(&self) -> Result<StoreOptions, CliError> {
        match self {
            Self::Disabled => Ok(StoreOptions::default()),
            Self::Library(path) => Ok(StoreOptions::with_spatialite(path.clone())),
            Self::Directory(dir) => resolve_spatialite(dir)
                .map(StoreOptions::with_spatialite)
                .ok_or_else(|| CliError::SpatialiteNotFound { dir: dir.clone() }),
        }
    }
}

/// Resolved `install` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstallConfig {
    pub(crate) gazetteer_config: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) downloads: Utf8PathBuf,
    pub(crate) chunk_size: NonZeroUsize,
    pub(crate) keep_downloads: bool,
    pub(crate) spatialite: SpatialiteSource,
}

impl InstallConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_file(&self.gazetteer_config, ARG_CONFIG)?;
        if let SpatialiteSource::Library(path) = &self.spatialite {
            require_file(path, ARG_SPATIALITE)?;
        }
        Ok(())
    }

    pub(crate) fn settings(&self) -> InstallerSettings {
        InstallerSettings {
            downloads_root: self.downloads.clone(),
            chunk_size: self.chunk_size,
            keep_downloads: self.keep_downloads,
        }
    }
}

impl TryFrom<InstallArgs> for InstallConfig {
    type Error = CliError;

    fn try_from(args: InstallArgs) -> Result<Self, Self::Error> {
        let gazetteer_config = args.gazetteer_config.ok_or(CliError::MissingArgument {
            field: ARG_CONFIG,
            env: ENV_INSTALL_CONFIG,
        })?;
        let spatialite = match (args.spatialite, args.spatialite_dir) {
            (Some(library), _) => SpatialiteSource::Library(library),
            (None, Some(dir)) => SpatialiteSource::Directory(dir),
            (None, None) => SpatialiteSource::Disabled,
        };
        Ok(Self {
            gazetteer_config,
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            downloads: args
                .downloads
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DOWNLOADS)),
            chunk_size: args.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            keep_downloads: args.keep_downloads,
            spatialite,
        })
    }
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match gazetteer_fs::is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn open_store(path: &Utf8Path, options: &StoreOptions) -> Result<Store, CliError> {
    Store::open(path, options).map_err(|source| CliError::OpenStore {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn run_install_with(args: InstallArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let report = execute_install(&config)?;
    write_json_line(writer, &report)
}

pub(crate) fn execute_install(config: &InstallConfig) -> Result<InstallReport, CliError> {
    config.validate_sources()?;
    let options = config.spatialite.store_options()?;
    let store = open_store(&config.database, &options)?;
    let mut installer = Installer::new(store, config.settings());
    let report = installer.install(&config.gazetteer_config)?;
    tracing::info!(
        gazetteer = %report.gazetteer,
        sources = report.sources.len(),
        "installed gazetteer into {}",
        config.database
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<InstallConfig, CliError> {
    let merged = InstallArgs::merge_from_layers(layers).map_err(CliError::from)?;
    InstallConfig::try_from(merged)
}
