use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by every endpoint.
/// Carries a machine-readable code alongside a short, user-safe message —
/// internal failure detail stays in the server logs, never in this body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Short, user-safe description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for tracing and debugging
    pub request_id: String,
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: code.to_string(),
            message: message.into(),
            field: None,
            request_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const AI_UNAVAILABLE: &str = "ai_unavailable";
    pub const AI_TIMEOUT: &str = "ai_timeout";
    pub const AI_FAILED: &str = "ai_failed";
    pub const MALFORMED_MODEL_OUTPUT: &str = "malformed_model_output";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
