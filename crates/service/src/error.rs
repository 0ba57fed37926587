use model::TransitionError;
use repository::RepositoryError;
use thiserror::Error;

/// The main error type for every operation of the lifecycle engine and the delivery manager.
///
/// Every variant except [`ServiceError::Dependency`] and [`ServiceError::Db`] guarantees that
/// nothing was written.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A referenced order, assignment, seller, or rider does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The current status does not permit the transition, or a concurrent transition won.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// The actor is not the party allowed to perform the transition.
    #[error("Not authorized: {0}")]
    Authorization(String),
    /// A stock ledger call failed after the status change committed.
    /// The order needs stock reconciliation.
    #[error("{component} failed: {source}")]
    Dependency {
        component: &'static str,
        #[source]
        source: RepositoryError,
    },
    /// A repository (database) operation failed before anything was committed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl ServiceError {
    /// Maps the outcome of a check-and-set write: a lost race is an invalid-state error.
    pub(crate) fn from_write(err: RepositoryError, what: impl Into<String>) -> Self {
        match err {
            RepositoryError::Conflict(detail) => ServiceError::InvalidState(detail),
            RepositoryError::NotFound => ServiceError::NotFound(what.into()),
            other => ServiceError::Db(other),
        }
    }

    pub(crate) fn from_lookup(err: RepositoryError, what: impl Into<String>) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound(what.into()),
            other => ServiceError::Db(other),
        }
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::Authorization(_) => "authorization_error",
            ServiceError::Dependency { .. } => "dependency_error",
            ServiceError::Db(_) => "storage_error",
        }
    }
}
