use std::fmt;

use fairsplit_common::db::DaoError;

/// Stable error taxonomy of the operation layer. Storage failures are logged
/// where they occur and surface only as `InternalError` with no detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceError {
    Unauthenticated,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    AlreadyAccepted,
    InvalidOperation(String),
    ValidationError(String),
    InternalError(String),
}

impl std::error::Error for ServiceError {}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Unauthenticated => write!(f, "ServiceError: Caller is not signed in"),
            ServiceError::Forbidden(msg) => write!(f, "ServiceError: Forbidden: {msg}"),
            ServiceError::NotFound(msg) => write!(f, "ServiceError: Not found: {msg}"),
            ServiceError::Conflict(msg) => write!(f, "ServiceError: Conflict: {msg}"),
            ServiceError::AlreadyAccepted => {
                write!(f, "ServiceError: Invitation was already accepted")
            }
            ServiceError::InvalidOperation(msg) => {
                write!(f, "ServiceError: Invalid operation: {msg}")
            }
            ServiceError::ValidationError(msg) => {
                write!(f, "ServiceError: Validation failed: {msg}")
            }
            ServiceError::InternalError(msg) => write!(f, "ServiceError: Internal error: {msg}"),
        }
    }
}

/// Maps a storage error for a lookup of the named entity. `NotFound` keeps
/// the entity name; anything else is logged and hidden.
pub fn db_error(error: DaoError, entity: &str) -> ServiceError {
    match error {
        DaoError::NotFound => ServiceError::NotFound(entity.to_owned()),
        DaoError::AlreadyExists => ServiceError::Conflict(entity.to_owned()),
        e => {
            log::error!("{e}");
            ServiceError::InternalError(entity.to_owned())
        }
    }
}
