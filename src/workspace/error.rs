//! Errors raised by workspace file-system operations.

use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors returned while staging workspace files.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file-system operation failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// Short description of the attempted operation.
        action: &'static str,
        /// Path the operation targeted.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A path could not be represented as UTF-8.
    #[error("workspace path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

impl WorkspaceError {
    /// Builds a mapper that wraps an I/O error with its action and path.
    pub(crate) fn io(action: &'static str, path: &Utf8Path) -> impl FnOnce(std::io::Error) -> Self {
        let owned_path = path.to_owned();
        move |source| Self::Io {
            action,
            path: owned_path,
            source,
        }
    }

    /// Returns the I/O error kind for [`WorkspaceError::Io`] failures.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            Self::NonUtf8Path(_) => None,
        }
    }
}
