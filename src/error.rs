//! Error taxonomy shared by the extraction/translation pipeline and the routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required backend (OCR engine, LLM API key, parser) is not configured.
    #[error("{0}")]
    Configuration(String),

    /// The input document could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// The LLM HTTP call failed (after the single allowed retry, if any).
    #[error("{0}")]
    Transport(String),

    /// The LLM answered, but not in the shape that was requested.
    #[error("{message}. Raw response: {raw}")]
    MalformedResponse { message: String, raw: String },

    /// The caller's input is incomplete or invalid.
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Insufficient credits for this operation (required {required}, available {available})")]
    InsufficientCredits { required: u64, available: u64 },

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::OrganizationNotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Transport(_) | Self::MalformedResponse { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self);
        } else {
            tracing::warn!("Request rejected ({}): {}", status, self);
        }

        let body = json!({
            "success": false,
            "error": { "message": self.to_string() },
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PipelineError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::Configuration("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::Transport("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::InsufficientCredits { required: 2, available: 1 }.status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_malformed_response_embeds_raw() {
        let err = PipelineError::MalformedResponse {
            message: "Missing 'translation' field".into(),
            raw: r#"{"text":"hola"}"#.into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Missing 'translation' field"));
        assert!(msg.contains(r#"{"text":"hola"}"#));
    }
}
