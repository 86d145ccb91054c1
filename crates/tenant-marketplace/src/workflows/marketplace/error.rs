use axum::http::StatusCode;

use super::providers::DirectoryError;
use super::repository::RepositoryError;

/// Errors raised by the lifecycle engine, comparison engine, and service facade.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    /// Malformed or incomplete input, e.g. sending an RFQ without invitees.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The operation exists but is not legal in the record's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// No such edge in the state machine.
    #[error("{entity} cannot {event} from status '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        event: &'static str,
    },
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl MarketplaceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketplaceError::InvalidState(_) | MarketplaceError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            MarketplaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarketplaceError::DataIntegrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MarketplaceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            MarketplaceError::Repository(_) | MarketplaceError::Directory(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketplaceError::Validation(_) => "validation_error",
            MarketplaceError::InvalidState(_) => "invalid_state",
            MarketplaceError::InvalidTransition { .. } => "invalid_transition",
            MarketplaceError::DataIntegrity(_) => "data_integrity_error",
            MarketplaceError::NotFound { .. } => "not_found",
            MarketplaceError::Repository(_) => "repository_error",
            MarketplaceError::Directory(_) => "directory_error",
        }
    }
}
