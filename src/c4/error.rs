// Centralized error handling for C4 ID computation
// Every failure carries the path and operation it came from

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::batch::BatchState;

pub type Result<T> = std::result::Result<T, C4Error>;

/// Main error type for C4 ID computation
#[derive(Debug, Error)]
pub enum C4Error {
    #[error("File not found: {}\nSuggestion: Check that the file path is correct and the file exists", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Permission denied while {operation} file: {}\nSuggestion: Check file permissions or run with appropriate privileges", .path.display())]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("I/O error while {operation}{}: {source}\nSuggestion: Check that the file is readable and not being modified", display_opt_path(.path))]
    Io {
        path: Option<PathBuf>,
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The computation observed a cancellation request before it finished.
    /// This is a control signal, not an I/O failure.
    #[error("Hash calculation{} was cancelled before finishing", display_opt_path(.path))]
    Incomplete { path: Option<PathBuf> },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Invalid C4 ID \"{id}\": {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error("Cannot {operation} while the batch is {state}\nSuggestion: Create a new queue or call reset() after join()")]
    InvalidState {
        operation: &'static str,
        state: BatchState,
    },
}

fn display_opt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" for {}", p.display()),
        None => String::new(),
    }
}

impl C4Error {
    /// Create an error from an io::Error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<&Path>) -> Self {
        match (err.kind(), path) {
            (io::ErrorKind::NotFound, Some(p)) => C4Error::FileNotFound {
                path: p.to_path_buf(),
            },
            (io::ErrorKind::PermissionDenied, Some(p)) => C4Error::PermissionDenied {
                path: p.to_path_buf(),
                operation: operation.to_string(),
            },
            _ => C4Error::Io {
                path: path.map(Path::to_path_buf),
                operation: operation.to_string(),
                source: err,
            },
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        C4Error::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// True when the error is a cancellation rather than a real failure.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, C4Error::Incomplete { .. })
    }

    /// True for the file-level failures (missing, unreadable, I/O).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            C4Error::FileNotFound { .. } | C4Error::PermissionDenied { .. } | C4Error::Io { .. }
        )
    }

    /// The path this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            C4Error::FileNotFound { path } | C4Error::PermissionDenied { path, .. } => Some(path),
            C4Error::Io { path, .. } | C4Error::Incomplete { path } => path.as_deref(),
            _ => None,
        }
    }
}

impl From<io::Error> for C4Error {
    fn from(err: io::Error) -> Self {
        C4Error::from_io_error(err, "reading", None)
    }
}
