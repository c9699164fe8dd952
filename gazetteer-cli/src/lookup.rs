//! Lookup commands over an installed gazetteer database.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gazetteer_data::catalog::gazetteer_id;
use gazetteer_data::{FeatureMatch, GazetteerId, Store, StoreOptions, feature_names};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::install::{open_store, require_file};
use crate::{
    ARG_DATABASE, ARG_GAZETTEER, ARG_IDENTIFIER, ARG_LIMIT, ARG_NAME, CliError, DEFAULT_DATABASE,
    ENV_FIND_GAZETTEER, ENV_FIND_IDENTIFIER, ENV_SEARCH_GAZETTEER, ENV_SEARCH_NAME,
    write_json_line,
};

const DEFAULT_LIMIT: usize = 10;

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Find features whose name matches exactly")]
#[ortho_config(prefix = "GAZETTEER")]
pub(crate) struct SearchArgs {
    /// Installed gazetteer to search.
    #[arg(long = ARG_GAZETTEER, value_name = "name")]
    #[serde(default)]
    pub(crate) gazetteer: Option<String>,
    /// Name to match, case-sensitively.
    #[arg(long = ARG_NAME, value_name = "text")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Maximum number of features to print.
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// SQLite database holding the gazetteer.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

/// CLI arguments for the `find` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Show the feature registered under an identifier")]
#[ortho_config(prefix = "GAZETTEER")]
pub(crate) struct FindArgs {
    /// Installed gazetteer to query.
    #[arg(long = ARG_GAZETTEER, value_name = "name")]
    #[serde(default)]
    pub(crate) gazetteer: Option<String>,
    /// Identifier value of the feature.
    #[arg(long = ARG_IDENTIFIER, value_name = "id")]
    #[serde(default)]
    pub(crate) identifier: Option<String>,
    /// SQLite database holding the gazetteer.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchConfig {
    pub(crate) gazetteer: String,
    pub(crate) name: String,
    pub(crate) limit: usize,
    pub(crate) database: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FindConfig {
    pub(crate) gazetteer: String,
    pub(crate) identifier: String,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let gazetteer = args.gazetteer.ok_or(CliError::MissingArgument {
            field: ARG_GAZETTEER,
            env: ENV_SEARCH_GAZETTEER,
        })?;
        let name = args.name.ok_or(CliError::MissingArgument {
            field: ARG_NAME,
            env: ENV_SEARCH_NAME,
        })?;
        Ok(Self {
            gazetteer,
            name,
            limit: args.limit.unwrap_or(DEFAULT_LIMIT),
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
        })
    }
}

impl TryFrom<FindArgs> for FindConfig {
    type Error = CliError;

    fn try_from(args: FindArgs) -> Result<Self, Self::Error> {
        let gazetteer = args.gazetteer.ok_or(CliError::MissingArgument {
            field: ARG_GAZETTEER,
            env: ENV_FIND_GAZETTEER,
        })?;
        let identifier = args.identifier.ok_or(CliError::MissingArgument {
            field: ARG_IDENTIFIER,
            env: ENV_FIND_IDENTIFIER,
        })?;
        Ok(Self {
            gazetteer,
            identifier,
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
        })
    }
}

/// One output line: the feature plus every name it is known by.
#[derive(Debug, Serialize)]
struct FeatureLine<'a> {
    #[serde(flatten)]
    feature: &'a FeatureMatch,
    names: Vec<String>,
}

/// Open an existing database and resolve the gazetteer by name.
fn open_gazetteer(
    database: &Utf8Path,
    gazetteer: &str,
) -> Result<(Store, GazetteerId), CliError> {
    require_file(database, ARG_DATABASE)?;
    let store = open_store(database, &StoreOptions::default())?;
    let id = gazetteer_id(store.connection(), gazetteer)?.ok_or_else(|| {
        CliError::UnknownGazetteer {
            name: gazetteer.to_owned(),
        }
    })?;
    Ok((store, id))
}

fn write_feature(
    writer: &mut dyn Write,
    store: &Store,
    feature: &FeatureMatch,
) -> Result<(), CliError> {
    let names = feature_names(store.connection(), feature.feature_id)?;
    write_json_line(writer, &FeatureLine { feature, names })
}

pub(crate) fn run_search_with(args: SearchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    search(&SearchConfig::try_from(merged)?, writer)
}

pub(crate) fn run_find_with(args: FindArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    find(&FindConfig::try_from(merged)?, writer)
}

pub(crate) fn search(config: &SearchConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let (store, id) = open_gazetteer(&config.database, &config.gazetteer)?;
    let matches =
        gazetteer_data::search_exact(store.connection(), id, &config.name, config.limit)?;
    tracing::debug!(query = %config.name, hits = matches.len(), "searched {}", config.gazetteer);
    for feature in &matches {
        write_feature(writer, &store, feature)?;
    }
    Ok(())
}

pub(crate) fn find(config: &FindConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let (store, id) = open_gazetteer(&config.database, &config.gazetteer)?;
    let feature = gazetteer_data::find_feature(store.connection(), id, &config.identifier)?
        .ok_or_else(|| CliError::UnknownFeature {
            gazetteer: config.gazetteer.clone(),
            identifier: config.identifier.clone(),
        })?;
    write_feature(writer, &store, &feature)
}
