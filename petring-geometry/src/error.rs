//! Geometry error types.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry error types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] petring_core::Error),
}

impl Error {
    /// Returns the underlying core error, if any.
    #[must_use]
    pub fn as_core(&self) -> Option<&petring_core::Error> {
        match self {
            Self::CoreError(e) => Some(e),
            _ => None,
        }
    }
}
