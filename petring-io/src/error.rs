//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in a step log or hit file.
    #[error("parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// A writer shared between workers panicked while holding its lock.
    #[error("output sink poisoned by a panicked worker")]
    SinkPoisoned,

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] petring_core::Error),

    /// Geometry error.
    #[error("geometry error: {0}")]
    GeometryError(#[from] petring_geometry::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),
}

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }
}
