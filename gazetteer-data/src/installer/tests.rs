use super::*;
use crate::acquisition::AcquisitionError;
use crate::acquisition::test_support::StubRemoteSource;
use crate::catalog::{feature_count, gazetteer_id, name_count};
use crate::store::StoreOptions;
use rstest::{fixture, rstest};
use std::io::Write;
use tempfile::TempDir;

const COUNTRIES_URL: &str = "https://data.example.org/world/countries.txt";

struct Sandbox {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Sandbox {
    fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        let mut file = gazetteer_fs::create_utf8_file(&path).expect("create file");
        file.write_all(contents.as_bytes()).expect("write file");
        path
    }

    fn settings(&self, keep_downloads: bool) -> InstallerSettings {
        InstallerSettings {
            downloads_root: self.root.join("downloads"),
            chunk_size: NonZeroUsize::new(2).expect("non-zero chunk size"),
            keep_downloads,
        }
    }

    fn installer(&self, keep_downloads: bool) -> Installer {
        let store = Store::open_in_memory(&StoreOptions::default()).expect("open store");
        let remote = StubRemoteSource::new().with_file(COUNTRIES_URL, "FR,France\nDE,Germany\n");
        Installer::new(store, self.settings(keep_downloads)).with_remote(Box::new(remote))
    }

    /// Cities are listed first even though their view joins countries.
    fn config(&self) -> GazetteerConfig {
        let document = format!(
            r#"
name: world
sources:
  - name: cities
    path: '{root}/cities.txt'
    file: cities.txt
    type: tabular
    separator: "\t"
    attributes:
      original:
        - {{ name: id, type: INTEGER }}
        - {{ name: name, type: TEXT, index: true }}
        - {{ name: country, type: TEXT }}
    view:
      select:
        - {{ source: cities, column: id }}
        - {{ source: cities, column: name }}
        - {{ source: countries, column: name, alias: country_name }}
      join:
        - {{ type: JOIN, source: countries, condition: cities.country = countries.iso }}
    features:
      identifier:
        - column: id
      names:
        - column: name
  - name: countries
    url: {COUNTRIES_URL}
    file: countries.txt
    type: tabular
    separator: ","
    attributes:
      original:
        - {{ name: iso, type: TEXT }}
        - {{ name: name, type: TEXT }}
    features:
      identifier:
        - column: iso
      names:
        - column: name
"#,
            root = self.root
        );
        GazetteerConfig::from_yaml_str(&document).expect("valid configuration")
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp path is UTF-8");
    let sandbox = Sandbox { _dir: dir, root };
    sandbox.write("cities.txt", "1\tParis\tFR\n2\tBerlin\tDE\n3\tNowhere\tXX\n");
    sandbox
}

#[rstest]
fn installs_dependencies_before_dependants(sandbox: Sandbox) {
    let mut installer = sandbox.installer(false);
    let report = installer
        .install_config(sandbox.config())
        .expect("install succeeds");

    let order: Vec<_> = report
        .sources
        .iter()
        .map(|source| source.source_name.as_str())
        .collect();
    assert_eq!(order, ["countries", "cities"]);
    assert_eq!(report.gazetteer, "world");

    let cities = &report.sources[1];
    assert_eq!(cities.view_name.as_deref(), Some("cities_view"));
    assert_eq!(cities.rows_loaded, 3);
    // The inner join drops the city without a country.
    assert_eq!(cities.features_registered, 2);

    let connection = installer.store().connection();
    assert_eq!(
        gazetteer_id(connection, "world").expect("look up gazetteer"),
        Some(report.gazetteer_id)
    );
    assert_eq!(feature_count(connection, report.gazetteer_id).expect("count"), 4);
    assert_eq!(name_count(connection, report.gazetteer_id).expect("count"), 4);
}

#[rstest]
fn reinstalling_leaves_counts_unchanged(sandbox: Sandbox) {
    let mut installer = sandbox.installer(false);
    let first = installer.install_config(sandbox.config()).expect("first install");
    let connection = installer.store().connection();
    let counts = (
        feature_count(connection, first.gazetteer_id).expect("count"),
        name_count(connection, first.gazetteer_id).expect("count"),
    );

    let second = installer.install_config(sandbox.config()).expect("second install");
    let connection = installer.store().connection();
    assert_eq!(
        (
            feature_count(connection, second.gazetteer_id).expect("count"),
            name_count(connection, second.gazetteer_id).expect("count"),
        ),
        counts
    );
    let gazetteers: i64 = connection
        .query_row("SELECT COUNT(*) FROM gazetteer", [], |row| row.get(0))
        .expect("count gazetteers");
    assert_eq!(gazetteers, 1);
}

#[rstest]
#[case::removed(false)]
#[case::kept(true)]
fn downloads_are_removed_unless_kept(sandbox: Sandbox, #[case] keep_downloads: bool) {
    let mut installer = sandbox.installer(keep_downloads);
    installer.install_config(sandbox.config()).expect("install succeeds");

    let downloads = installer.settings().downloads_dir("world");
    assert_eq!(downloads, sandbox.root.join("downloads").join("world"));
    assert_eq!(
        gazetteer_fs::is_file(&downloads.join("countries.txt")).expect("probe download"),
        keep_downloads
    );
}

#[rstest]
fn install_reads_configuration_from_disk(sandbox: Sandbox) {
    sandbox.write("countries.txt", "FR,France\n");
    let path = sandbox.write(
        "world.yaml",
        &format!(
            "name: world\nsources:\n  - name: countries\n    path: '{}/countries.txt'\n    \
             file: countries.txt\n    type: tabular\n    separator: \",\"\n    attributes:\n      \
             original:\n        - {{ name: iso, type: TEXT }}\n        - {{ name: name, type: TEXT }}\n",
            sandbox.root
        ),
    );
    let mut installer = sandbox.installer(false);
    let report = installer.install(&path).expect("install from file");
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].rows_loaded, 1);
    assert_eq!(report.sources[0].features_registered, 0);
}

#[rstest]
fn failing_source_aborts_but_keeps_earlier_sources(sandbox: Sandbox) {
    let document = format!(
        "name: world\nsources:\n  - name: countries\n    url: {COUNTRIES_URL}\n    \
         file: countries.txt\n    type: tabular\n    separator: \",\"\n    attributes:\n      \
         original:\n        - {{ name: iso, type: TEXT }}\n        - {{ name: name, type: TEXT }}\n    \
         features:\n      identifier:\n        - column: iso\n      names:\n        - column: name\n  \
         - name: towns\n    path: '{}/towns.txt'\n    file: towns.txt\n    type: tabular\n    \
         separator: \",\"\n    attributes:\n      original:\n        - {{ name: id, type: INTEGER }}\n",
        sandbox.root
    );
    let config = GazetteerConfig::from_yaml_str(&document).expect("valid configuration");
    let mut installer = sandbox.installer(false);

    let err = installer.install_config(config).expect_err("towns is missing");
    match err {
        InstallError::Source {
            source_name,
            source: StageError::Acquisition(AcquisitionError::MissingLocalPath { .. }),
        } => assert_eq!(source_name, "towns"),
        other => panic!("unexpected error {other:?}"),
    }

    let connection = installer.store().connection();
    let id = gazetteer_id(connection, "world")
        .expect("look up gazetteer")
        .expect("gazetteer row exists");
    assert_eq!(feature_count(connection, id).expect("count"), 2);
    assert!(
        gazetteer_fs::is_dir(&installer.settings().downloads_dir("world")).expect("probe dir"),
        "downloads survive a failed install"
    );
}

#[rstest]
fn cycles_are_rejected(sandbox: Sandbox) {
    let document = format!(
        r#"
name: loops
sources:
  - name: a
    path: '{root}/cities.txt'
    file: cities.txt
    type: tabular
    separator: ","
    attributes:
      original:
        - {{ name: id, type: TEXT }}
    view:
      select:
        - {{ source: b, column: id }}
  - name: b
    path: '{root}/cities.txt'
    file: cities.txt
    type: tabular
    separator: ","
    attributes:
      original:
        - {{ name: id, type: TEXT }}
    view:
      select:
        - {{ source: a, column: id }}
"#,
        root = sandbox.root
    );
    let config = GazetteerConfig::from_yaml_str(&document).expect("valid configuration");
    let mut installer = sandbox.installer(false);
    let err = installer.install_config(config).expect_err("cycle");
    assert!(matches!(err, InstallError::Resolve(_)), "{err:?}");
}

#[rstest]
fn default_settings_use_twenty_thousand_row_batches() {
    let settings = InstallerSettings::default();
    assert_eq!(settings.chunk_size.get(), 20_000);
    assert!(!settings.keep_downloads);
    assert_eq!(settings.downloads_dir("geonames"), "downloads/geonames");
}
