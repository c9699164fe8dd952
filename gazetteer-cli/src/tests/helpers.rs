//! Test helpers that lay out a gazetteer workspace on disk.

use crate::install::{InstallConfig, SpatialiteSource};
use crate::lookup::{FindConfig, SearchConfig};
use camino::{Utf8Path, Utf8PathBuf};
use gazetteer_data::DEFAULT_CHUNK_SIZE;
use serde_json::Value;
use std::io::Write;
use tempfile::TempDir;

const PLACES: &str = "1,Paris,Lutetia;Paname\n2,Lyon,Lugdunum\n3,Paris,\n";

pub(super) fn write_utf8(path: &Utf8Path, contents: &str) {
    let mut file = gazetteer_fs::create_utf8_file(path).expect("create file");
    file.write_all(contents.as_bytes()).expect("write file");
}

/// A temporary directory holding a one-source gazetteer configuration.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        write_utf8(&root.join("places.csv"), PLACES);
        let document = format!(
            r#"name: world
sources:
  - name: places
    path: '{root}/places.csv'
    file: places.csv
    type: tabular
    separator: ","
    attributes:
      original:
        - {{ name: id, type: INTEGER }}
        - {{ name: name, type: TEXT, index: true }}
        - {{ name: alternates, type: TEXT }}
    features:
      identifier:
        - column: id
      names:
        - column: name
        - column: alternates
          separator: ";"
"#
        );
        write_utf8(&root.join("world.yaml"), &document);
        Self { _dir: dir, root }
    }

    pub(super) fn config_path(&self) -> Utf8PathBuf {
        self.root.join("world.yaml")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("gazetteer.db")
    }

    pub(super) fn downloads(&self) -> Utf8PathBuf {
        self.root.join("downloads")
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn install_config(&self) -> InstallConfig {
        InstallConfig {
            gazetteer_config: self.config_path(),
            database: self.database(),
            downloads: self.downloads(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_downloads: false,
            spatialite: SpatialiteSource::Disabled,
        }
    }

    pub(super) fn search_config(&self, name: &str) -> SearchConfig {
        SearchConfig {
            gazetteer: "world".to_owned(),
            name: name.to_owned(),
            limit: 10,
            database: self.database(),
        }
    }

    pub(super) fn find_config(&self, identifier: &str) -> FindConfig {
        FindConfig {
            gazetteer: "world".to_owned(),
            identifier: identifier.to_owned(),
            database: self.database(),
        }
    }
}

/// Parse JSON-lines output.
pub(super) fn json_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect()
}
