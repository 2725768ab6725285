use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::store::StoreError;

/// Error kinds surfaced by the orchestrator.
///
/// Precondition violations (`NotFound`, `Conflict`, `Invalid`) are detected
/// before any side effect and carry no partial state. `Backend` failures are
/// transient and eligible for caller-level retry; they are never retried
/// internally, so history records cannot be duplicated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("object storage failure: {0}")]
    Backend(#[source] ObjectStoreError),
    #[error("metadata store failure: {0}")]
    Internal(#[from] StoreError),
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }
}

impl From<ObjectStoreError> for Error {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(key) => {
                Error::NotFound(format!("Object '{key}' not found."))
            }
            ObjectStoreError::RangeNotSatisfiable(msg) => Error::Invalid(msg),
            other => Error::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
