use super::*;
use rstest::rstest;
use tempfile::TempDir;

fn table_names(store: &Store) -> Vec<String> {
    let mut statement = store
        .connection()
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .expect("prepare table listing");
    statement
        .query_map([], |row| row.get(0))
        .expect("list tables")
        .collect::<Result<_, _>>()
        .expect("read table names")
}

#[rstest]
fn in_memory_store_has_catalog_and_foreign_keys() {
    let store = Store::open_in_memory(&StoreOptions::default()).expect("open store");
    assert!(!store.has_spatialite());

    let names = table_names(&store);
    for expected in ["feature", "gazetteer", "gazetteer_schema_version", "name", "source"] {
        assert!(names.iter().any(|name| name == expected), "missing {expected}");
    }

    let foreign_keys: i64 = store
        .connection()
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .expect("read pragma");
    assert_eq!(foreign_keys, 1);
}

#[rstest]
fn file_store_creates_parent_directory_and_reopens() {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8Path::from_path(dir.path()).expect("temp path is UTF-8");
    let path = root.join("nested/gazetteer.db");

    drop(Store::open(&path, &StoreOptions::default()).expect("create store"));
    assert!(gazetteer_fs::is_file(&path).expect("probe database"));
    Store::open(&path, &StoreOptions::default()).expect("reopen existing store");
}

#[rstest]
fn missing_extension_is_a_load_error() {
    let options = StoreOptions::with_spatialite("/nonexistent/mod_spatialite.so");
    let err = Store::open_in_memory(&options).expect_err("loading must fail");
    assert!(matches!(err, StoreError::LoadExtension { .. }), "{err:?}");
}

#[rstest]
#[case("linux", "x86_64", Some("linux-x86_64/mod_spatialite.so"))]
#[case("macos", "x86_64", Some("darwin-x86_64/mod_spatialite.dylib"))]
#[case("macos", "aarch64", Some("darwin-arm64/mod_spatialite.dylib"))]
#[case("windows", "x86_64", Some("win-amd64/mod_spatialite.dll"))]
#[case("linux", "aarch64", None)]
#[case("freebsd", "x86_64", None)]
fn maps_platforms_to_bundled_libraries(
    #[case] os: &str,
    #[case] arch: &str,
    #[case] expected: Option<&str>,
) {
    assert_eq!(
        spatialite_library(os, arch),
        expected.map(Utf8PathBuf::from)
    );
}

#[rstest]
fn resolve_requires_the_library_file() {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8Path::from_path(dir.path()).expect("temp path is UTF-8");
    assert_eq!(resolve_spatialite(root), None);

    if let Some(relative) = spatialite_library(std::env::consts::OS, std::env::consts::ARCH) {
        let library = root.join(relative);
        gazetteer_fs::create_utf8_file(&library).expect("create placeholder library");
        assert_eq!(resolve_spatialite(root), Some(library));
    }
}
