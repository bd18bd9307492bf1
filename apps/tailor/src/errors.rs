use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::document::{DocumentError, SpliceError};
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid document: {0}")]
    DocumentFormat(String),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Provider authentication failed: {0}")]
    ProviderAuth(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider response error: {0}")]
    ProviderResponse(String),

    #[error("Splice error: {0}")]
    Splice(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The pipeline stage that failed, reported to the client alongside the code.
    pub fn step(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::PayloadTooLarge(_) => "upload",
            AppError::DocumentFormat(_) | AppError::EmptyDocument => "document",
            AppError::ProviderAuth(_)
            | AppError::ProviderUnavailable(_)
            | AppError::ProviderResponse(_) => "provider",
            AppError::Splice(_) => "splice",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::DocumentFormat(_) => "DOCUMENT_FORMAT",
            AppError::EmptyDocument => "EMPTY_DOCUMENT",
            AppError::ProviderAuth(_) => "PROVIDER_AUTH",
            AppError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AppError::ProviderResponse(_) => "PROVIDER_RESPONSE",
            AppError::Splice(_) => "SPLICE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Format(msg) => AppError::DocumentFormat(msg),
            DocumentError::Empty => AppError::EmptyDocument,
        }
    }
}

impl From<SpliceError> for AppError {
    fn from(e: SpliceError) -> Self {
        AppError::Splice(e.to_string())
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey(provider) => AppError::ProviderAuth(format!(
                "no API key for {provider}; enter one or set it in the server environment"
            )),
            LlmError::Auth { .. } => AppError::ProviderAuth(e.to_string()),
            LlmError::Unavailable { .. } => AppError::ProviderUnavailable(e.to_string()),
            LlmError::Api { .. } | LlmError::Malformed { .. } | LlmError::EmptyContent(_) => {
                AppError::ProviderResponse(e.to_string())
            }
            LlmError::UnknownModel(_) => AppError::Validation(e.to_string()),
            LlmError::Client(_) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::DocumentFormat(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("The file is not a readable .docx document: {msg}"),
            ),
            AppError::EmptyDocument => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The document contains no paragraphs".to_string(),
            ),
            AppError::ProviderAuth(msg) => {
                tracing::warn!("Provider auth error: {msg}");
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::ProviderUnavailable(msg) => {
                tracing::error!("Provider unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("{msg}. Please try again in a moment."),
                )
            }
            AppError::ProviderResponse(msg) => {
                tracing::error!("Provider response error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Splice(msg) => {
                tracing::error!("Splice error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The rewritten text could not be written back into the document".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "step": self.step(),
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
