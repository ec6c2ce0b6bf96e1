//! Error types for the SDM engine.

use thiserror::Error;

/// SDM error types.
#[derive(Error, Debug)]
pub enum SdmError {
    /// Input vector length differs from the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Persisted state was written by a store with a different shape
    #[error(
        "State shape mismatch: stored {stored_locations}x{stored_dim}, \
         configured {locations}x{dim}"
    )]
    StateShapeMismatch {
        stored_locations: u16,
        stored_dim: u16,
        locations: u16,
        dim: u16,
    },

    /// A binary payload ended before its declared contents
    #[error("Truncated payload: {path}")]
    Truncated { path: String },

    /// Counter or address matrix could not be allocated
    #[error("Allocation failed: {0}")]
    Allocation(#[from] std::collections::TryReserveError),

    /// Filesystem error on the block device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Named library is absent from the device
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    /// Value kind does not match the requested encoding
    #[error("Encoding mismatch: expected {expected} input")]
    EncodingMismatch { expected: &'static str },
}

/// Result type alias for SDM operations.
pub type Result<T> = std::result::Result<T, SdmError>;
