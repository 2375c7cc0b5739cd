//! Error types for API calls and store operations.

use reqwest::StatusCode;

use crate::models::{ProjectId, ValidationErrors};

/// Failure of a single API round-trip
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("Project {id} not found")]
    NotFound { id: ProjectId },

    #[error("Validation failed: {}", .0.summary())]
    Validation(ValidationErrors),

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Error code for programmatic handling and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } => "API_TRANSPORT",
            ApiError::Decode { .. } => "API_DECODE",
            ApiError::Status { .. } => "API_STATUS",
            ApiError::NotFound { .. } => "PROJECT_NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::Cancelled => "REQUEST_CANCELLED",
        }
    }

    /// Whether the user can fix this by changing their input
    pub fn is_user_error(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
