//! Error types for PersonaIQ services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for validation, provider, storage and conflict failures
//! - HTTP status code mapping
//! - Structured error responses carrying a human-readable `detail`
//! - Error codes for client handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    MissingField,
    InvalidJson,

    // Resource errors
    NotFound,
    PersonaNotFound,

    // Conflict errors
    DuplicatePersona,

    // Storage errors
    StorageError,
    DatabaseError,
    StorageTimeout,

    // External provider errors
    ProviderError,
    ProviderTimeout,
    UpstreamError,

    // Internal errors
    InternalError,
    ConfigurationError,
    SerializationError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid JSON body: {message}")]
    InvalidJson { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Persona not found: {id}")]
    PersonaNotFound { id: String },

    // Conflict errors
    #[error("Persona already exists: {id}")]
    DuplicatePersona { id: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Storage timeout after {timeout_ms}ms")]
    StorageTimeout { timeout_ms: u64 },

    // External provider errors
    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    #[error("{provider} provider timeout after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Shorthand for an upstream provider failure
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        AppError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a vector-store or registry failure
    pub fn storage(message: impl Into<String>) -> Self {
        AppError::Storage {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidJson { .. } => ErrorCode::InvalidJson,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            AppError::DuplicatePersona { .. } => ErrorCode::DuplicatePersona,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::StorageTimeout { .. } => ErrorCode::StorageTimeout,
            AppError::Provider { .. } => ErrorCode::ProviderError,
            AppError::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 422 Unprocessable Entity
            AppError::InvalidJson { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 404 Not Found
            AppError::NotFound { .. } |
            AppError::PersonaNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicatePersona { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Storage { .. } |
            AppError::Database(_) |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Provider { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::ProviderTimeout { .. } |
            AppError::StorageTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message, mirrored at the top level for simple clients
    pub detail: String,
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            AppError::MissingField { field } => Some(field.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            detail: message.clone(),
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidJson {
            message: rejection.body_text(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|k| k.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::PersonaNotFound { id: "ghost".into() };
        assert_eq!(err.code(), ErrorCode::PersonaNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("text", "text must not be empty");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_conflict_and_provider_errors() {
        let dup = AppError::DuplicatePersona { id: "doug".into() };
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);
        assert_eq!(dup.code(), ErrorCode::DuplicatePersona);

        let upstream = AppError::provider("completion", "model overloaded");
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
        assert!(upstream.to_string().contains("model overloaded"));

        let timeout = AppError::ProviderTimeout { provider: "embedding".into(), timeout_ms: 30_000 };
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_storage_error_is_server_error() {
        let err = AppError::storage("insert failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
