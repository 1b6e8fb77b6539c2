use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds of a load or render pass.
///
/// Only `Load` ends the session. The others are reported on the page and the
/// next filter change retries the pass.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("Failed to load dataset {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Missing columns {0:?} required to build the map")]
    Schema(Vec<String>),

    #[error("No records with valid coordinates to show ({skipped} skipped)")]
    NoValidData { skipped: usize },

    #[error("Failed to render map: {0}")]
    Render(String),
}

impl MapError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MapError::Load { path: path.into(), reason: reason.to_string() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, MapError::Load { .. })
    }
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::Render(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
