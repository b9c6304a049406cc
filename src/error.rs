//! Error types for BucketDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BucketError
pub type Result<T> = std::result::Result<T, BucketError>;

/// Unified error type for BucketDB operations
#[derive(Debug, Error)]
pub enum BucketError {
    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // -------------------------------------------------------------------------
    // Validation Errors (always raised before a transaction is opened)
    // -------------------------------------------------------------------------
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Duplicate entry in batch: {0}")]
    DuplicateInBatch(String),

    #[error("Payload already exists: {0}")]
    AlreadyExists(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Malformed record id: {0:?}")]
    MalformedId(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transaction conflict: gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for BucketError {
    fn from(err: bincode::Error) -> Self {
        BucketError::Serialization(err.to_string())
    }
}

impl BucketError {
    /// True for errors raised by batch validation, before any write.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BucketError::EmptyPayload
                | BucketError::DuplicateInBatch(_)
                | BucketError::AlreadyExists(_)
                | BucketError::NotFound(_)
                | BucketError::MalformedId(_)
                | BucketError::InvalidPattern(_)
        )
    }
}
