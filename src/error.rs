//! Error types for recordstore
//!
//! Provides a unified error type for all operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for recordstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    /// A table header failed the safely-closed check, or a descriptor points
    /// outside the heap. The dataset must be deleted and recreated.
    #[error("Storage {} is corrupted, rebuild required: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Invalid record id: {0}")]
    InvalidRecordId(u32),

    #[error("Record too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("Range {offset}..{} out of bounds for record {record} of size {size}", .offset + .len)]
    OutOfBounds {
        record: u32,
        offset: usize,
        len: usize,
        size: usize,
    },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True if the error means the dataset has to be rebuilt from scratch
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }
}

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
