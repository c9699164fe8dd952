//! Focused unit tests covering CLI configuration, install and lookups.

use super::helpers::{Workspace, json_lines};
use super::*;
use crate::install::{
    InstallArgs, InstallConfig, SpatialiteSource, config_from_layers_for_test, execute_install,
};
use crate::lookup::{FindArgs, FindConfig, SearchArgs, SearchConfig, find, search};
use camino::Utf8PathBuf;
use gazetteer_data::DEFAULT_CHUNK_SIZE;
use rstest::{fixture, rstest};
use std::num::NonZeroUsize;

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

#[fixture]
fn installed(workspace: Workspace) -> Workspace {
    execute_install(&workspace.install_config()).expect("install should succeed");
    workspace
}

fn expect_missing(err: CliError, field: &'static str, env_var: &'static str) {
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn converting_install_without_config_errors() {
    let err = InstallConfig::try_from(InstallArgs::default()).expect_err("config is required");
    expect_missing(err, ARG_CONFIG, ENV_INSTALL_CONFIG);
}

#[rstest]
#[case::no_gazetteer(None, Some("Paris"), ARG_GAZETTEER, ENV_SEARCH_GAZETTEER)]
#[case::no_name(Some("world"), None, ARG_NAME, ENV_SEARCH_NAME)]
fn converting_search_without_required_fields_errors(
    #[case] gazetteer: Option<&str>,
    #[case] name: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = SearchArgs {
        gazetteer: gazetteer.map(str::to_owned),
        name: name.map(str::to_owned),
        ..SearchArgs::default()
    };
    let err = SearchConfig::try_from(args).expect_err("missing field should error");
    expect_missing(err, field, env_var);
}

#[rstest]
#[case::no_gazetteer(None, Some("1"), ARG_GAZETTEER, ENV_FIND_GAZETTEER)]
#[case::no_identifier(Some("world"), None, ARG_IDENTIFIER, ENV_FIND_IDENTIFIER)]
fn converting_find_without_required_fields_errors(
    #[case] gazetteer: Option<&str>,
    #[case] identifier: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = FindArgs {
        gazetteer: gazetteer.map(str::to_owned),
        identifier: identifier.map(str::to_owned),
        ..FindArgs::default()
    };
    let err = FindConfig::try_from(args).expect_err("missing field should error");
    expect_missing(err, field, env_var);
}

#[rstest]
fn install_config_applies_defaults() {
    let args = InstallArgs {
        gazetteer_config: Some(Utf8PathBuf::from("world.yaml")),
        ..InstallArgs::default()
    };
    let config = InstallConfig::try_from(args).expect("config should build");
    assert_eq!(config.database, Utf8PathBuf::from("gazetteer.db"));
    assert_eq!(config.downloads, Utf8PathBuf::from("downloads"));
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert!(!config.keep_downloads);
    assert_eq!(config.spatialite, SpatialiteSource::Disabled);

    let search = SearchConfig::try_from(SearchArgs {
        gazetteer: Some("world".to_owned()),
        name: Some("Paris".to_owned()),
        ..SearchArgs::default()
    })
    .expect("search config should build");
    assert_eq!(search.limit, 10);
    assert_eq!(search.database, Utf8PathBuf::from("gazetteer.db"));
}

#[rstest]
fn explicit_spatialite_library_wins_over_directory() {
    let args = InstallArgs {
        gazetteer_config: Some(Utf8PathBuf::from("world.yaml")),
        spatialite: Some(Utf8PathBuf::from("/opt/mod_spatialite.so")),
        spatialite_dir: Some(Utf8PathBuf::from("/opt/libs")),
        ..InstallArgs::default()
    };
    let config = InstallConfig::try_from(args).expect("config should build");
    assert_eq!(
        config.spatialite,
        SpatialiteSource::Library(Utf8PathBuf::from("/opt/mod_spatialite.so"))
    );
    let options = config.spatialite.store_options().expect("options");
    assert_eq!(
        options.spatialite.as_deref(),
        Some(camino::Utf8Path::new("/opt/mod_spatialite.so"))
    );
}

#[rstest]
fn empty_spatialite_directory_is_reported(workspace: Workspace) {
    let source = SpatialiteSource::Directory(workspace.root().join("libs"));
    match source.store_options() {
        Err(CliError::SpatialiteNotFound { dir }) => assert_eq!(dir, workspace.root().join("libs")),
        other => panic!("expected SpatialiteNotFound, found {other:?}"),
    }
}

#[rstest]
fn validate_sources_reports_missing_configuration(workspace: Workspace) {
    let mut config = workspace.install_config();
    config.gazetteer_config = workspace.root().join("absent.yaml");
    match config.validate_sources() {
        Err(CliError::MissingSourceFile { field, path }) => {
            assert_eq!(field, ARG_CONFIG);
            assert_eq!(path, workspace.root().join("absent.yaml"));
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

#[rstest]
fn validate_sources_rejects_directories(workspace: Workspace) {
    let mut config = workspace.install_config();
    config.gazetteer_config = workspace.root().to_path_buf();
    match config.validate_sources() {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(field, ARG_CONFIG),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "gazetteer_config": "world.yaml", "chunk_size": 0 }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("a zero chunk size should be rejected");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "database": "from-file.db",
            "chunk_size": 500,
            "keep_downloads": true,
        }),
        None,
    );
    composer.push_environment(json!({
        "gazetteer_config": "from-env.yaml",
        "database": "from-env.db",
    }));
    composer.push_cli(json!({ "database": "from-cli.db" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.gazetteer_config, Utf8PathBuf::from("from-env.yaml"));
    assert_eq!(config.database, Utf8PathBuf::from("from-cli.db"));
    assert_eq!(config.chunk_size, NonZeroUsize::new(500).expect("non-zero"));
    assert!(config.keep_downloads);
}

#[rstest]
fn install_writes_a_report_and_removes_downloads(workspace: Workspace) {
    let report = execute_install(&workspace.install_config()).expect("install should succeed");
    assert_eq!(report.gazetteer, "world");
    let [source] = report.sources.as_slice() else {
        panic!("expected one source, found {:?}", report.sources);
    };
    assert_eq!(source.source_name, "places");
    assert_eq!(source.rows_loaded, 3);
    assert_eq!(source.features_registered, 3);
    let downloads = workspace.downloads().join("world");
    assert!(!gazetteer_fs::is_dir(&downloads).expect("probe downloads"));
}

#[rstest]
fn search_prints_each_feature_with_its_names(installed: Workspace) {
    let mut output = Vec::new();
    search(&installed.search_config("\"Paris\""), &mut output).expect("search should succeed");
    let lines = json_lines(&output);
    let identifiers: Vec<_> = lines
        .iter()
        .map(|line| line["location_id_value"].as_str().expect("identifier"))
        .collect();
    assert_eq!(identifiers, ["1", "3"]);
    assert_eq!(lines[0]["source_name"], "places");
    assert_eq!(lines[0]["location_id_name"], "id");
    assert_eq!(
        lines[0]["names"],
        serde_json::json!(["Lutetia", "Paname", "Paris"])
    );
}

#[rstest]
fn search_respects_the_limit(installed: Workspace) {
    let mut config = installed.search_config("Paris");
    config.limit = 1;
    let mut output = Vec::new();
    search(&config, &mut output).expect("search should succeed");
    assert_eq!(json_lines(&output).len(), 1);
}

#[rstest]
fn find_prints_the_feature(installed: Workspace) {
    let mut output = Vec::new();
    find(&installed.find_config("2"), &mut output).expect("find should succeed");
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["names"], serde_json::json!(["Lugdunum", "Lyon"]));
}

#[rstest]
fn find_reports_unknown_identifiers(installed: Workspace) {
    let mut output = Vec::new();
    match find(&installed.find_config("999"), &mut output) {
        Err(CliError::UnknownFeature {
            gazetteer,
            identifier,
        }) => {
            assert_eq!(gazetteer, "world");
            assert_eq!(identifier, "999");
        }
        other => panic!("expected UnknownFeature, found {other:?}"),
    }
    assert!(output.is_empty());
}

#[rstest]
fn lookups_report_unknown_gazetteers(installed: Workspace) {
    let mut config = installed.search_config("Paris");
    config.gazetteer = "moon".to_owned();
    match search(&config, &mut Vec::new()) {
        Err(CliError::UnknownGazetteer { name }) => assert_eq!(name, "moon"),
        other => panic!("expected UnknownGazetteer, found {other:?}"),
    }
}

#[rstest]
fn lookups_require_an_existing_database(workspace: Workspace) {
    match search(&workspace.search_config("Paris"), &mut Vec::new()) {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(field, ARG_DATABASE),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    assert!(!gazetteer_fs::is_file(&workspace.database()).expect("probe database"));
}

#[rstest]
#[case::quiet(&[], tracing::Level::WARN)]
#[case::verbose(&["-v"], tracing::Level::INFO)]
#[case::debug(&["--debug"], tracing::Level::DEBUG)]
#[case::both(&["--verbose", "-d"], tracing::Level::DEBUG)]
fn logging_flags_select_the_level(#[case] flags: &[&str], #[case] expected: tracing::Level) {
    let mut invocation = vec!["gazetteer"];
    invocation.extend_from_slice(flags);
    invocation.extend(["find", "--gazetteer", "world", "--identifier", "1"]);
    let cli = Cli::try_parse_from(invocation).expect("arguments should parse");
    assert_eq!(cli.level(), expected);
}

#[rstest]
fn spatialite_flags_conflict() {
    let invocation = [
        "gazetteer",
        "install",
        "--config",
        "world.yaml",
        "--spatialite",
        "mod_spatialite.so",
        "--spatialite-dir",
        "libs",
    ];
    let err = Cli::try_parse_from(invocation).expect_err("flags should conflict");
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[rstest]
fn install_flags_parse_into_arguments(workspace: Workspace) {
    let config = workspace.config_path();
    let invocation = [
        "gazetteer",
        "install",
        "--config",
        config.as_str(),
        "--chunk-size",
        "250",
        "--keep-downloads",
    ];
    let cli = Cli::try_parse_from(invocation).expect("arguments should parse");
    let Command::Install(args) = cli.command else {
        panic!("expected the install command");
    };
    assert_eq!(args.gazetteer_config.as_ref(), Some(&config));
    assert_eq!(args.chunk_size, NonZeroUsize::new(250));
    assert!(args.keep_downloads);
}
