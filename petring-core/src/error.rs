//! Error types for petring-core.

use thiserror::Error;

/// Result type alias for petring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for petring operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Detector family name not recognised.
    #[error("unknown detector family: {0}")]
    UnknownFamily(String),

    /// Granularity name not recognised.
    #[error("unknown granularity: {0}")]
    UnknownGranularity(String),

    /// Crystal material name not recognised.
    #[error("unknown crystal material: {0}")]
    UnknownMaterial(String),

    /// Source isotope name not recognised.
    #[error("unknown isotope: {0}")]
    UnknownIsotope(String),

    /// Requested slot count is zero or negative.
    #[error("slot count must be positive, got {0}")]
    NonPositiveCount(i64),

    /// Requested slot count does not fill a whole number of rings.
    #[error("slot count {count} is not a whole multiple of {per_ring} slots per ring")]
    NonIntegralCount { count: usize, per_ring: usize },

    /// Flat index outside the slot table.
    #[error("index {index} out of range for table of {len} slots")]
    IndexOutOfRange { index: usize, len: usize },

    /// Activity readback requested before any energy was recorded.
    #[error("no activity recorded in any crystal")]
    NoActivity,
}
