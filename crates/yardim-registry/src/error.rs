//! Error types for the registration core.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not complete the operation. Nothing was written.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness rule other than the identity number was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist. Carries the referencing column.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A column rule was violated or a stored value could not be decoded.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("Store task failed: {}", e))
    }
}

/// Access-control failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Failures of the admission procedure.
///
/// A duplicate identity number is not an error; it is a rejected outcome.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Access(#[from] AccessError),

    /// Fatal for this call; safe to retry from scratch.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// The store refused the write for a reason a retry will not change.
    #[error("Store rejected the registration: {0}")]
    Internal(StoreError),
}

impl From<ValidationErrors> for AdmissionError {
    fn from(e: ValidationErrors) -> Self {
        AdmissionError::Validation(e)
    }
}

/// CSV report failures.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report buffer error: {0}")]
    Buffer(String),
}
