//! Spreadsheet ingestion: decode the upload, then reconcile each row against
//! the reference tables and upsert its survey/sample/detail chain.

use serde::{Deserialize, Serialize};
use valuable::Valuable;

use crate::db;

mod decode;
mod reconciler;
mod vocabulary;

pub use reconciler::import_batch;

#[derive(
    Deserialize, Serialize, Valuable, Clone, Copy, Debug, PartialEq, Eq, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TabularFormat {
    Csv,
    Xls,
    Xlsx,
}

/// Which row variant the upload carries. Filter uploads additionally write
/// the 1:1 filter detail; field uploads stop at the sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
    FilterSamples,
    FieldSamples,
}

#[derive(Serialize, Valuable, Default, Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<RowError>,
}

#[derive(Serialize, Valuable, Clone, Debug, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Failures that abort the whole batch. Row-level problems never surface
/// here; they land in [`ImportReport::errors`].
#[derive(thiserror::Error, Serialize, Valuable, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportError {
    #[error("failed to decode {format} data: {message}")]
    Decode {
        format: TabularFormat,
        message: String,
    },
    #[error("{n_rows} rows exceeds the import limit of {max_rows}")]
    TooManyRows { n_rows: usize, max_rows: usize },
    #[error(transparent)]
    Db(#[from] db::error::Error),
}

impl From<diesel::result::Error> for ImportError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Db(err.into())
    }
}
