//! Error types shared across the build pipeline.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from relative path arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path resolves to a location above the source root.
    #[error("path {path} escapes the source root")]
    EscapesRoot { path: String },

    /// The path is not located under the source root at all.
    #[error("path {} is outside the source root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// A component is not valid UTF-8 and cannot be used as an index key.
    #[error("path {} is not valid UTF-8", path.display())]
    NonUtf8 { path: PathBuf },
}

/// Errors from filesystem operations and session setup.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An I/O error, with the path that was being touched.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    /// An ignore pattern failed to compile.
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured roots cannot be used together.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl AsRef<Path>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
