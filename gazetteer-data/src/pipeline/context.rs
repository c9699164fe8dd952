use camino::{Utf8Path, Utf8PathBuf};

use super::StageError;

/// Outputs accumulated while one source moves through the pipeline.
///
/// Each stage takes the context produced by the previous stage and returns
/// it with its own outputs filled in. A fresh context is used per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContext {
    /// Acquired file, set by acquisition.
    pub file_path: Option<Utf8PathBuf>,
    /// Staging table, set by schema.
    pub table_name: Option<String>,
    /// View over the staging table, set by schema when declared.
    pub view_name: Option<String>,
    /// Rows written by ingestion.
    pub rows_loaded: usize,
    /// Feature rows inserted by registration.
    pub features_registered: usize,
    /// Name rows inserted by registration.
    pub names_registered: usize,
    /// Columns whose index could not be built.
    pub failed_indexes: Vec<String>,
}

impl SourceContext {
    /// The acquired file path.
    ///
    /// # Errors
    /// Returns [`StageError::MissingContext`] when acquisition has not run.
    pub fn require_file_path(&self, stage: &'static str) -> Result<&Utf8Path, StageError> {
        self.file_path
            .as_deref()
            .ok_or(StageError::MissingContext {
                stage,
                key: "file_path",
            })
    }

    /// The staging table name.
    ///
    /// # Errors
    /// Returns [`StageError::MissingContext`] when the schema stage has not
    /// run.
    pub fn require_table_name(&self, stage: &'static str) -> Result<&str, StageError> {
        self.table_name
            .as_deref()
            .ok_or(StageError::MissingContext {
                stage,
                key: "table_name",
            })
    }

    /// Relation that registration reads: the view when one exists, otherwise
    /// the table.
    ///
    /// # Errors
    /// As for [`SourceContext::require_table_name`].
    pub fn registration_table(&self, stage: &'static str) -> Result<&str, StageError> {
        match self.view_name.as_deref() {
            Some(view) => Ok(view),
            None => self.require_table_name(stage),
        }
    }
}
