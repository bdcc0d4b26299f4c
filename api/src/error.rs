use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kapsa_core::error::{self, ApiError};
use kapsa_core::repair::RepairError;

use crate::inference::InferenceError;

/// Internal error type that converts to structured API responses.
///
/// Known, anticipated failure categories map to short user-safe messages;
/// anything unanticipated is logged with full detail and surfaced only as a
/// generic internal error — upstream and database error text never reaches
/// the client.
#[derive(Debug)]
pub enum AppError {
    /// Bad input shape or range (400)
    Validation {
        message: String,
        field: Option<String>,
    },
    /// Missing or rejected bearer credential (401)
    Unauthorized { message: String },
    /// Unknown record, or a record owned by someone else (404).
    /// The two cases are deliberately indistinguishable to the caller.
    NotFound { resource: String },
    /// The inference service rejected the job submission (500)
    ServiceUnavailable,
    /// Polling exhausted its attempt budget without a terminal state (500)
    InferenceTimeout,
    /// The inference job reached the failed terminal state (500)
    InferenceFailed,
    /// Model output could not be parsed even after repair (500)
    MalformedModelOutput,
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation { message, field } => {
                let mut body = ApiError::new(error::codes::VALIDATION_FAILED, message);
                if let Some(field) = field {
                    body = body.with_field(field);
                }
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ApiError::new(error::codes::UNAUTHORIZED, message),
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError::new(error::codes::NOT_FOUND, format!("{resource} not found")),
            ),
            AppError::ServiceUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    error::codes::AI_UNAVAILABLE,
                    "AI service unavailable. Please try again.",
                ),
            ),
            AppError::InferenceTimeout => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    error::codes::AI_TIMEOUT,
                    "AI processing timed out. Please try again.",
                ),
            ),
            AppError::InferenceFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    error::codes::AI_FAILED,
                    "AI processing failed. Please try again.",
                ),
            ),
            AppError::MalformedModelOutput => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    error::codes::MALFORMED_MODEL_OUTPUT,
                    "The AI response could not be processed. Please try again.",
                ),
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new(error::codes::INTERNAL_ERROR, "An internal error occurred"),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new(error::codes::INTERNAL_ERROR, "An internal error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<RepairError> for AppError {
    fn from(err: RepairError) -> Self {
        tracing::warn!("Model output repair failed: {}", err);
        AppError::MalformedModelOutput
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Unavailable { .. } | InferenceError::Transport(_) => {
                tracing::error!("Inference submission failed: {}", err);
                AppError::ServiceUnavailable
            }
            InferenceError::TimedOut { .. } => {
                tracing::error!("Inference polling exhausted: {}", err);
                AppError::InferenceTimeout
            }
            InferenceError::Failed { .. } => {
                tracing::error!("Inference job failed: {}", err);
                AppError::InferenceFailed
            }
        }
    }
}
