use serde::Serialize;

use super::ballot::BallotError;
use super::calculation::CalculationError;
use super::eligibility::EligibilityError;
use super::external::CollaboratorError;
use super::repository::RepositoryError;

/// Coarse classification the transport layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    ActionNotAllowed,
    Unauthorized,
    Conflict,
    ServerError,
}

/// Error raised by the funding service and the calculation data preparer.
#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("action not allowed: {0}")]
    ActionNotAllowed(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Ballot(#[from] BallotError),
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl FundingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FundingError::NotFound(_) => ErrorKind::NotFound,
            FundingError::BadRequest(_)
            | FundingError::Ballot(_)
            | FundingError::Eligibility(_) => ErrorKind::BadRequest,
            FundingError::ActionNotAllowed(_) => ErrorKind::ActionNotAllowed,
            FundingError::Unauthorized(_) => ErrorKind::Unauthorized,
            FundingError::Calculation(CalculationError::UnknownMetric(_)) => ErrorKind::NotFound,
            FundingError::Calculation(_) => ErrorKind::ServerError,
            FundingError::Repository(RepositoryError::Conflict) => ErrorKind::Conflict,
            FundingError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            FundingError::Repository(RepositoryError::Finalized) => ErrorKind::ActionNotAllowed,
            FundingError::Repository(RepositoryError::Unavailable(_)) => ErrorKind::ServerError,
            FundingError::Collaborator(CollaboratorError::Signature(_)) => ErrorKind::Unauthorized,
            FundingError::Collaborator(_) => ErrorKind::ServerError,
        }
    }
}
