//! Error types for generation and for the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Classified failure of a single generation attempt.
///
/// Only `Quota` and `TransientService` are worth retrying; everything else
/// is terminal for the attempt that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Service unavailable: {0}")]
    TransientService(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No image returned: {0}")]
    NoOutput(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Aborted(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Quota(_) | Self::TransientService(_))
    }

    /// Short machine-readable name used in logs and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Auth(_) => "auth_error",
            Self::Quota(_) => "quota_error",
            Self::TransientService(_) => "transient_service_error",
            Self::Validation(_) => "validation_error",
            Self::NoOutput(_) => "no_output_error",
            Self::Rejected { .. } => "rejected_error",
            Self::Aborted(_) => "aborted_error",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenerationError::NoOutput(format!("unreadable response body: {}", e))
        } else {
            GenerationError::TransientService(format!("network error: {}", e))
        }
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid batch input: {0}")]
    InvalidBatchInput(String),

    #[error("A batch job is already processing")]
    JobInProgress,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format (OpenAI compatible)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

fn generation_status(e: &GenerationError) -> StatusCode {
    match e {
        GenerationError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        GenerationError::Auth(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Quota(_) => StatusCode::TOO_MANY_REQUESTS,
        GenerationError::TransientService(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
        GenerationError::NoOutput(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GenerationError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::Generation(e) => (generation_status(e), "generation_error", Some(e.kind())),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::InvalidBatchInput(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_batch_input")),
            AppError::JobInProgress => (StatusCode::CONFLICT, "conflict_error", Some("job_in_progress")),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
