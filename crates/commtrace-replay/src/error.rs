//! Error types for commtrace-replay

use thiserror::Error;

/// Errors from replay configuration and transport control.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid color {value:?}: expected #rgb or #rrggbb")]
    InvalidColor { value: String },

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;
