//! Validated gazetteer descriptions.
//!
//! A gazetteer document is deserialised into a loose serde mirror first and
//! then converted into the types below. The conversion enforces every
//! structural invariant, so holding a [`GazetteerConfig`] means the document
//! is internally consistent: source names are unique identifiers, each
//! source has exactly one location, format-specific fields match the source
//! kind, geometry columns are unique and carry an SRID, and every view
//! reference names a declared source.
//!
//! # Examples
//! ```
//! use gazetteer_core::{GazetteerConfig, SourceKind};
//!
//! let config = GazetteerConfig::from_yaml_str(
//!     r#"
//! name: demo
//! sources:
//!   - name: places
//!     path: data/places.tsv
//!     file: places.tsv
//!     type: tabular
//!     separator: "\t"
//!     attributes:
//!       original:
//!         - { name: id, type: INTEGER }
//!         - { name: name, type: TEXT }
//! "#,
//! )
//! .expect("valid configuration");
//! assert_eq!(config.name(), "demo");
//! assert_eq!(config.sources()[0].kind(), SourceKind::Tabular);
//! ```

mod error;
mod raw;

use std::collections::{BTreeSet, HashSet};
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

pub use error::ConfigError;
use raw::{
    RawDerived, RawFeatures, RawGazetteer, RawJoin, RawName, RawOriginal, RawSelect, RawSource,
    RawView,
};

use crate::query::is_identifier;

/// Suffix appended to geometry columns while they still hold WKT text.
pub const WKT_SUFFIX: &str = "_wkt";

/// Suffix appended to a source name to form its view name.
pub const VIEW_SUFFIX: &str = "_view";

/// Declared kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Delimited text.
    Tabular,
    /// Vector geometry.
    Spatial,
}

/// Column types accepted in attribute declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// `TEXT`
    Text,
    /// `INTEGER`
    Integer,
    /// `REAL`
    Real,
    /// `BLOB`
    Blob,
    /// `GEOMETRY`, staged as WKT text until transformation.
    Geometry,
}

impl DataType {
    /// SQL type name used in `CREATE TABLE`.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Geometry => "GEOMETRY",
        }
    }

    /// Whether the type denotes the geometry column.
    #[must_use]
    pub const fn is_geometry(self) -> bool {
        matches!(self, Self::Geometry)
    }
}

/// Physical column name for an attribute: geometry columns are staged under
/// `<name>_wkt`.
#[must_use]
pub fn storage_column(name: &str, data_type: DataType) -> String {
    if data_type.is_geometry() {
        format!("{name}{WKT_SUFFIX}")
    } else {
        name.to_owned()
    }
}

/// Attribute read from the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalAttribute {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Whether an index is built after loading.
    pub index: bool,
    /// Whether the column is skipped. It still occupies its input position.
    pub drop: bool,
    /// Spatial reference for the geometry column.
    pub srid: Option<i32>,
}

impl OriginalAttribute {
    /// Column name in the staged table.
    #[must_use]
    pub fn storage_column(&self) -> String {
        storage_column(&self.name, self.data_type)
    }
}

/// Attribute computed from a SQL expression after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAttribute {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// SQL expression evaluated per row.
    pub expression: String,
    /// Whether an index is built after transformation.
    pub index: bool,
    /// Spatial reference for a derived geometry.
    pub srid: Option<i32>,
}

impl DerivedAttribute {
    /// Column name in the staged table.
    #[must_use]
    pub fn storage_column(&self) -> String {
        storage_column(&self.name, self.data_type)
    }
}

/// The single geometry column of a source, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryColumn<'a> {
    /// Column name, always `geometry`.
    pub name: &'a str,
    /// Spatial reference identifier.
    pub srid: i32,
}

/// One projected column in a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    /// Source whose table provides the column.
    pub source: String,
    /// Column name.
    pub column: String,
    /// Optional output alias.
    pub alias: Option<String>,
}

/// SQL join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN` (also written `JOIN`).
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL OUTER JOIN`
    Full,
    /// `CROSS JOIN`
    Cross,
}

impl JoinKind {
    /// Parse a join keyword sequence, ignoring case and spacing.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let normalised = text
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect::<Vec<_>>()
            .join(" ");
        match normalised.as_str() {
            "JOIN" | "INNER JOIN" => Some(Self::Inner),
            "LEFT JOIN" | "LEFT OUTER JOIN" => Some(Self::Left),
            "RIGHT JOIN" | "RIGHT OUTER JOIN" => Some(Self::Right),
            "FULL JOIN" | "FULL OUTER JOIN" => Some(Self::Full),
            "CROSS JOIN" => Some(Self::Cross),
            _ => None,
        }
    }

    /// Keyword sequence emitted in SQL.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL OUTER JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// One joined source in a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinItem {
    /// Join flavour.
    pub kind: JoinKind,
    /// Joined source.
    pub source: String,
    /// Raw SQL join condition.
    pub condition: String,
}

/// View declared over a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Projected columns, in order. Never empty.
    pub select: Vec<SelectItem>,
    /// Joins applied after the base table, in order.
    pub join: Vec<JoinItem>,
}

impl ViewConfig {
    /// Every source named by the view's select items and joins.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.select
            .iter()
            .map(|item| item.source.as_str())
            .chain(self.join.iter().map(|item| item.source.as_str()))
    }
}

/// Name column registered for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameColumn {
    /// Column holding the name text.
    pub column: String,
    /// Separator splitting several names in one field.
    pub separator: Option<String>,
}

/// Features extracted from a source for name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Column identifying each feature.
    pub identifier: String,
    /// Columns providing names. Never empty.
    pub names: Vec<NameColumn>,
}

/// Where a source file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Downloaded over HTTP(S).
    Remote(String),
    /// Read from the local filesystem.
    Local(Utf8PathBuf),
}

/// Format-specific reading options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text without a header row.
    Tabular {
        /// Field delimiter.
        separator: u8,
        /// Leading lines skipped before the first record.
        skip_rows: usize,
    },
    /// Vector geometry.
    Spatial {
        /// Layer to read, where the format has several.
        layer: Option<String>,
    },
}

impl SourceFormat {
    /// Kind matching this format.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Tabular { .. } => SourceKind::Tabular,
            Self::Spatial { .. } => SourceKind::Spatial,
        }
    }
}

/// A validated source description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    name: String,
    location: SourceLocation,
    file: String,
    format: SourceFormat,
    original: Vec<OriginalAttribute>,
    derived: Vec<DerivedAttribute>,
    view: Option<ViewConfig>,
    features: Option<FeatureConfig>,
}

impl SourceConfig {
    /// Source name, also used as its table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the source is fetched from.
    #[must_use]
    pub const fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Name of the file to load once the source is acquired.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Format-specific options.
    #[must_use]
    pub const fn format(&self) -> &SourceFormat {
        &self.format
    }

    /// Declared kind.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.format.kind()
    }

    /// Attributes read from the file, in input order.
    #[must_use]
    pub fn original_attributes(&self) -> &[OriginalAttribute] {
        &self.original
    }

    /// Attributes computed after loading.
    #[must_use]
    pub fn derived_attributes(&self) -> &[DerivedAttribute] {
        &self.derived
    }

    /// Optional view definition.
    #[must_use]
    pub const fn view(&self) -> Option<&ViewConfig> {
        self.view.as_ref()
    }

    /// Optional feature definition.
    #[must_use]
    pub const fn features(&self) -> Option<&FeatureConfig> {
        self.features.as_ref()
    }

    /// Name of the view, when one is declared.
    #[must_use]
    pub fn view_name(&self) -> Option<String> {
        self.view
            .as_ref()
            .map(|_| format!("{}{VIEW_SUFFIX}", self.name))
    }

    /// The geometry column, original or derived.
    #[must_use]
    pub fn geometry(&self) -> Option<GeometryColumn<'_>> {
        let original = self
            .original
            .iter()
            .filter(|attribute| !attribute.drop)
            .find_map(|attribute| geometry_of(&attribute.name, attribute.data_type, attribute.srid));
        original.or_else(|| {
            self.derived.iter().find_map(|attribute| {
                geometry_of(&attribute.name, attribute.data_type, attribute.srid)
            })
        })
    }

    /// Columns flagged for indexing, with their types.
    #[must_use]
    pub fn indexed_columns(&self) -> Vec<(&str, DataType)> {
        let original = self
            .original
            .iter()
            .filter(|attribute| attribute.index && !attribute.drop)
            .map(|attribute| (attribute.name.as_str(), attribute.data_type));
        let derived = self
            .derived
            .iter()
            .filter(|attribute| attribute.index)
            .map(|attribute| (attribute.name.as_str(), attribute.data_type));
        original.chain(derived).collect()
    }

    /// Other sources this source's view reads from.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.view
            .iter()
            .flat_map(ViewConfig::references)
            .filter(|reference| *reference != self.name)
            .collect()
    }
}

fn geometry_of(name: &str, data_type: DataType, srid: Option<i32>) -> Option<GeometryColumn<'_>> {
    match (data_type, srid) {
        (DataType::Geometry, Some(srid)) => Some(GeometryColumn { name, srid }),
        _ => None,
    }
}

/// A validated gazetteer description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerConfig {
    name: String,
    sources: Vec<SourceConfig>,
}

impl GazetteerConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed YAML and a specific
    /// variant for each violated invariant.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let raw: RawGazetteer =
            serde_yaml::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        build_gazetteer(raw)
    }

    /// Parse and validate a YAML document from a reader.
    ///
    /// # Errors
    /// As for [`GazetteerConfig::from_yaml_str`].
    pub fn from_yaml_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let raw: RawGazetteer =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse { source })?;
        build_gazetteer(raw)
    }

    /// Load and validate a YAML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] when the file cannot be opened, otherwise
    /// as for [`GazetteerConfig::from_yaml_str`].
    pub fn from_yaml_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let file = gazetteer_fs::open_utf8_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_reader(file)
    }

    /// Gazetteer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sources in declaration order.
    #[must_use]
    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Look up a source by name.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.name == name)
    }
}

fn build_gazetteer(raw: RawGazetteer) -> Result<GazetteerConfig, ConfigError> {
    if !is_identifier(&raw.name) {
        return Err(ConfigError::InvalidGazetteerName { name: raw.name });
    }
    let sources = raw
        .sources
        .into_iter()
        .map(build_source)
        .collect::<Result<Vec<_>, _>>()?;

    let mut names = HashSet::new();
    for source in &sources {
        if !names.insert(source.name()) {
            return Err(ConfigError::DuplicateSource {
                name: source.name().to_owned(),
            });
        }
    }
    for source in &sources {
        let Some(view) = source.view() else { continue };
        if let Some(reference) = view.references().find(|name| !names.contains(name)) {
            return Err(ConfigError::UnknownViewSource {
                source_name: source.name().to_owned(),
                reference: reference.to_owned(),
            });
        }
    }

    Ok(GazetteerConfig {
        name: raw.name,
        sources,
    })
}

fn build_source(raw: RawSource) -> Result<SourceConfig, ConfigError> {
    let name = raw.name;
    if !is_identifier(&name) {
        return Err(ConfigError::InvalidSourceName { name });
    }

    let location = match (raw.url, raw.path) {
        (Some(_), Some(_)) => return Err(ConfigError::AmbiguousLocation { source_name: name }),
        (None, None) => return Err(ConfigError::MissingLocation { source_name: name }),
        (Some(url), None) => SourceLocation::Remote(url),
        (None, Some(path)) => SourceLocation::Local(Utf8PathBuf::from(path)),
    };

    let original = raw
        .attributes
        .original
        .into_iter()
        .map(|attribute| build_original(&name, attribute))
        .collect::<Result<Vec<_>, _>>()?;
    let derived = raw
        .attributes
        .derived
        .into_iter()
        .map(|attribute| build_derived(&name, attribute))
        .collect::<Result<Vec<_>, _>>()?;
    check_unique_attributes(&name, &original, &derived)?;

    let format = build_format(&name, raw.kind, raw.separator, raw.skiprows, raw.layer)?;
    check_geometry(&name, format.kind(), &original, &derived)?;

    let view = raw.view.map(|view| build_view(&name, view)).transpose()?;
    let features = raw
        .features
        .map(|features| build_features(&name, features))
        .transpose()?;

    Ok(SourceConfig {
        name,
        location,
        file: raw.file,
        format,
        original,
        derived,
        view,
        features,
    })
}

fn check_srid(
    source_name: &str,
    attribute: &str,
    data_type: DataType,
    srid: Option<i32>,
) -> Result<Option<i32>, ConfigError> {
    match (data_type.is_geometry(), srid) {
        (true, None) => Err(ConfigError::MissingSrid {
            source_name: source_name.to_owned(),
            attribute: attribute.to_owned(),
        }),
        (false, Some(_)) => Err(ConfigError::UnexpectedSrid {
            source_name: source_name.to_owned(),
            attribute: attribute.to_owned(),
        }),
        (_, srid) => Ok(srid),
    }
}

fn build_original(source_name: &str, raw: RawOriginal) -> Result<OriginalAttribute, ConfigError> {
    let srid = check_srid(source_name, &raw.name, raw.data_type, raw.srid)?;
    Ok(OriginalAttribute {
        name: raw.name,
        data_type: raw.data_type,
        index: raw.index,
        drop: raw.drop,
        srid,
    })
}

fn build_derived(source_name: &str, raw: RawDerived) -> Result<DerivedAttribute, ConfigError> {
    let srid = check_srid(source_name, &raw.name, raw.data_type, raw.srid)?;
    Ok(DerivedAttribute {
        name: raw.name,
        data_type: raw.data_type,
        expression: raw.expression,
        index: raw.index,
        srid,
    })
}

fn check_unique_attributes(
    source_name: &str,
    original: &[OriginalAttribute],
    derived: &[DerivedAttribute],
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let names = original
        .iter()
        .map(|attribute| attribute.name.as_str())
        .chain(derived.iter().map(|attribute| attribute.name.as_str()));
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateAttribute {
                source_name: source_name.to_owned(),
                attribute: name.to_owned(),
            });
        }
    }
    Ok(())
}

fn build_format(
    source_name: &str,
    kind: SourceKind,
    separator: Option<String>,
    skip_rows: Option<usize>,
    layer: Option<String>,
) -> Result<SourceFormat, ConfigError> {
    match kind {
        SourceKind::Tabular => {
            if layer.is_some() {
                return Err(ConfigError::LayerOnTabular {
                    source_name: source_name.to_owned(),
                });
            }
            let separator = separator.ok_or_else(|| ConfigError::MissingSeparator {
                source_name: source_name.to_owned(),
            })?;
            let byte = match separator.as_bytes() {
                [byte] => *byte,
                _ => {
                    return Err(ConfigError::InvalidSeparator {
                        source_name: source_name.to_owned(),
                        separator,
                    });
                }
            };
            Ok(SourceFormat::Tabular {
                separator: byte,
                skip_rows: skip_rows.unwrap_or_default(),
            })
        }
        SourceKind::Spatial => {
            if separator.is_some() {
                return Err(ConfigError::SeparatorOnSpatial {
                    source_name: source_name.to_owned(),
                });
            }
            if skip_rows.is_some() {
                return Err(ConfigError::SkipRowsOnSpatial {
                    source_name: source_name.to_owned(),
                });
            }
            Ok(SourceFormat::Spatial { layer })
        }
    }
}

fn check_geometry(
    source_name: &str,
    kind: SourceKind,
    original: &[OriginalAttribute],
    derived: &[DerivedAttribute],
) -> Result<(), ConfigError> {
    let geometries: Vec<&str> = original
        .iter()
        .filter(|attribute| attribute.data_type.is_geometry())
        .map(|attribute| attribute.name.as_str())
        .chain(
            derived
                .iter()
                .filter(|attribute| attribute.data_type.is_geometry())
                .map(|attribute| attribute.name.as_str()),
        )
        .collect();

    if kind == SourceKind::Spatial && geometries.len() != 1 {
        return Err(ConfigError::SpatialGeometryCount {
            source_name: source_name.to_owned(),
            found: geometries.len(),
        });
    }
    match geometries.as_slice() {
        [] => Ok(()),
        [name] if *name == "geometry" => Ok(()),
        [name] => Err(ConfigError::GeometryName {
            source_name: source_name.to_owned(),
            attribute: (*name).to_owned(),
        }),
        _ => Err(ConfigError::MultipleGeometries {
            source_name: source_name.to_owned(),
        }),
    }
}

fn build_view(source_name: &str, raw: RawView) -> Result<ViewConfig, ConfigError> {
    if raw.select.is_empty() {
        return Err(ConfigError::EmptyViewSelect {
            source_name: source_name.to_owned(),
        });
    }
    let select = raw
        .select
        .into_iter()
        .map(|RawSelect { source, column, alias }| SelectItem {
            source,
            column,
            alias,
        })
        .collect();
    let join = raw
        .join
        .unwrap_or_default()
        .into_iter()
        .map(|RawJoin { kind, source, condition }| -> Result<JoinItem, ConfigError> {
            let parsed = JoinKind::parse(&kind).ok_or_else(|| ConfigError::UnknownJoinKind {
                source_name: source_name.to_owned(),
                kind,
            })?;
            Ok(JoinItem {
                kind: parsed,
                source,
                condition,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ViewConfig { select, join })
}

fn build_features(source_name: &str, raw: RawFeatures) -> Result<FeatureConfig, ConfigError> {
    let found = raw.identifier.len();
    let mut identifiers = raw.identifier.into_iter();
    let identifier = match (identifiers.next(), identifiers.next()) {
        (Some(column), None) => column.column,
        _ => {
            return Err(ConfigError::IdentifierCount {
                source_name: source_name.to_owned(),
                found,
            });
        }
    };
    if raw.names.is_empty() {
        return Err(ConfigError::MissingNames {
            source_name: source_name.to_owned(),
        });
    }
    let names = raw
        .names
        .into_iter()
        .map(|RawName { column, separator }| {
            if separator.as_deref() == Some("") {
                return Err(ConfigError::EmptyNameSeparator {
                    source_name: source_name.to_owned(),
                    column,
                });
            }
            Ok(NameColumn { column, separator })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureConfig { identifier, names })
}
