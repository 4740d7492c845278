//! Error taxonomy shared by every pipeline stage.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or corrupt boundary / raster source.
    #[error("cannot load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Raster identifier does not encode a `{sex}_{age}_{year}` stratum.
    #[error("cannot parse stratum from `{name}`: {reason}")]
    Parse { name: String, reason: String },

    /// Reference frame missing, unsupported, or different from the regions' frame.
    #[error("reference frame problem in {}: {reason}", path.display())]
    ReferenceFrame { path: PathBuf, reason: String },

    /// Assembled data violates the dataset schema.
    #[error("schema violation: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cache at {}: {reason}", path.display())]
    Cache { path: PathBuf, reason: String },

    #[error("task cancelled before it started")]
    Cancelled,

    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn load(path: &Path, reason: impl ToString) -> Self {
        Error::Load { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub(crate) fn parse(name: &str, reason: impl ToString) -> Self {
        Error::Parse { name: name.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn frame(path: &Path, reason: impl ToString) -> Self {
        Error::ReferenceFrame { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub(crate) fn cache(path: &Path, reason: impl ToString) -> Self {
        Error::Cache { path: path.to_path_buf(), reason: reason.to_string() }
    }

    /// Short stable tag for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Load { .. } => "load",
            Error::Parse { .. } => "parse",
            Error::ReferenceFrame { .. } => "reference_frame",
            Error::Schema(_) => "schema",
            Error::Config(_) => "config",
            Error::Cache { .. } => "cache",
            Error::Cancelled => "cancelled",
            Error::Pool(_) => "pool",
        }
    }
}
