//! Errors returned by process operations.

use crate::store::StoreError;
use thiserror::Error;

/// Request-level failures. None of them leave the service unusable.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process not found")]
    NotFound,
    #[error("missing or invalid fields: {}", .fields.join(", "))]
    Validation { fields: Vec<String> },
    #[error("no such columns in the worksheet: {}", .fields.join(", "))]
    UnknownFields { fields: Vec<String> },
    #[error("could not process field {field}: {message}")]
    Transform { field: String, message: String },
    #[error("could not compute derived values for {field}: {message}")]
    DerivedField { field: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
