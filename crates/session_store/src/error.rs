use std::path::PathBuf;

use thiserror::Error;

use crate::schema::EntryValidationError;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while reading line {line} in {path}: {source}")]
    IoLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON at {path}:{line} (content: {content:?}): {source}")]
    JsonLineParse {
        path: PathBuf,
        line: usize,
        content: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid entry at {path}:{line} (content: {content:?}): {source}")]
    InvalidEntry {
        path: PathBuf,
        line: usize,
        content: String,
        #[source]
        source: EntryValidationError,
    },

    #[error("refusing to append invalid entry to {path}: {source}")]
    InvalidAppend {
        path: PathBuf,
        #[source]
        source: EntryValidationError,
    },

    #[error("watched file path has no file name: {path}")]
    MissingFileName { path: PathBuf },

    #[error("failed to serialize entry for {path}: {source}")]
    JsonSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to format current UTC timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn io_line(path: impl Into<PathBuf>, line: usize, source: std::io::Error) -> Self {
        Self::IoLine {
            path: path.into(),
            line,
            source,
        }
    }

    #[must_use]
    pub fn json_line(
        path: impl Into<PathBuf>,
        line: usize,
        content: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::JsonLineParse {
            path: path.into(),
            line,
            content: content.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonSerialize {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the error means the log content itself is unusable.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::JsonLineParse { .. } | Self::InvalidEntry { .. }
        )
    }
}
