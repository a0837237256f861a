use crate::api::{ApiError, ApiErrorKind};

/// Failure of a single user action. None of these are fatal to the app.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthRequired(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Remote(ApiError),
}

impl AppError {
    pub fn auth_required(what: &str) -> Self {
        AppError::AuthRequired(format!("User must be authenticated to {what}"))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::AuthRequired(_) | AppError::InvalidCredentials(_))
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        match e.kind {
            ApiErrorKind::Unauthorized => AppError::AuthRequired(e.message),
            _ => AppError::Remote(e),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
