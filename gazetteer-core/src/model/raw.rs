//! Serde mirror of the YAML document before validation.

use serde::Deserialize;

use super::{DataType, SourceKind};

#[derive(Debug, Deserialize)]
pub(super) struct RawGazetteer {
    pub name: String,
    pub sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSource {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub file: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub skiprows: Option<usize>,
    #[serde(default)]
    pub layer: Option<String>,
    pub attributes: RawAttributes,
    #[serde(default)]
    pub view: Option<RawView>,
    #[serde(default)]
    pub features: Option<RawFeatures>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawAttributes {
    pub original: Vec<RawOriginal>,
    #[serde(default)]
    pub derived: Vec<RawDerived>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawOriginal {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub drop: bool,
    #[serde(default)]
    pub srid: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawDerived {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub expression: String,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub srid: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawView {
    pub select: Vec<RawSelect>,
    #[serde(default)]
    pub join: Option<Vec<RawJoin>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSelect {
    pub source: String,
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawJoin {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub condition: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawFeatures {
    pub identifier: Vec<RawColumn>,
    pub names: Vec<RawName>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawColumn {
    pub column: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawName {
    pub column: String,
    #[serde(default)]
    pub separator: Option<String>,
}
