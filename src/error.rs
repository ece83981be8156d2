//! Error taxonomy for the business hours engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoursError {
    /// No business hour with the given id
    #[error("business hour not found: {id}")]
    NotFound { id: String },

    /// Malformed business hour definition (bad weekday, finish before start, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying data access failed. Propagated unchanged; the engine never
    /// retries. Retry policy belongs to the caller.
    #[error("repository unavailable: {0}")]
    Repository(String),
}

pub type Result<T> = std::result::Result<T, HoursError>;
