//! Error taxonomy shared across the query and indexer paths.
//!
//! Each layer returns `Result<T, AppError>`. The HTTP boundary
//! (`http::handlers`) is the single place an `AppError` is reshaped into a
//! client-visible envelope, following the teacher stack's convention of
//! returning `(StatusCode, Json<ConnectError>)` from fallible handlers.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("search backend unavailable: {0}")]
    SearchUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("fatal indexer error: {0}")]
    FatalIndexer(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    ServiceUnavailable,
    Internal,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidArgument),
            AppError::SearchUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable)
            }
            AppError::Database(_) | AppError::FatalIndexer(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
            }
        }
    }
}
