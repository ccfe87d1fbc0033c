//! Error types for commtrace-core

use thiserror::Error;

/// Errors from the log-loading and merge layer.
///
/// Per-file parse problems are not errors: they are reported as
/// [`crate::merge::FileSummary::Failed`] so one bad file cannot sink a
/// batch. Only real I/O failures surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
