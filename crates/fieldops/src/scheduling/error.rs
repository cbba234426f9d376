use super::domain::TokenRejection;
use super::repository::{DeliveryError, RedemptionError, RepositoryError};

/// Error raised by the scheduling services.
///
/// `Conflict` is kept apart from `NotFound` so callers know to re-query availability rather
/// than repeat the same write.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("slot just taken: {0}")]
    Conflict(String),
    #[error(transparent)]
    Token(#[from] TokenRejection),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("downstream delivery failed: {0}")]
    Downstream(#[from] DeliveryError),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl SchedulingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable reason code for API consumers.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Token(rejection) => rejection.code(),
            Self::Invalid(_) => "invalid",
            Self::Downstream(_) => "downstream",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<RepositoryError> for SchedulingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            RepositoryError::Unavailable(detail) => Self::Unavailable(detail),
        }
    }
}

impl From<RedemptionError> for SchedulingError {
    fn from(value: RedemptionError) -> Self {
        match value {
            RedemptionError::Rejected(rejection) => Self::Token(rejection),
            RedemptionError::Repository(err) => err.into(),
        }
    }
}
