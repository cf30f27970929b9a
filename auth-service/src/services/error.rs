use service_core::error::AppError;
use thiserror::Error;

/// Error taxonomy of the branch and permission services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced entity is absent (branch, role, allowed email, permission).
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation or delete blocked by existing references.
    #[error("{0}")]
    Conflict(String),

    /// Malformed input, e.g. an unknown permission code.
    #[error("{0}")]
    BadRequest(String),

    /// Authorization gate rejection.
    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServiceError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(e) => AppError::NotFound(anyhow::anyhow!(e)),
            ServiceError::Conflict(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::BadRequest(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::Forbidden(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Session(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
