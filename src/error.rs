use axum::{
    response::{IntoResponse, Response},
    Json,
    http::StatusCode,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("No news found for this location")]
    NoArticles,

    #[error("Failed to read logs: {0}")]
    LogRead(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NoArticles => (
                StatusCode::NOT_FOUND,
                "No news found for this location".to_string(),
            ),
            AppError::LogRead(detail) => {
                tracing::error!(%detail, "failed to read request log");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read logs".to_string(),
                )
            }
            AppError::Config(detail) => {
                tracing::error!(%detail, "configuration error at request time");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!(%detail, "unexpected error in request pipeline");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
