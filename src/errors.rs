// ABOUTME: Unified error handling system with standard error codes and HTTP responses
// ABOUTME: Defines the AppError type shared by the pipeline, storage, and route layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Unified Error Handling System
//!
//! This module provides a centralized error handling system for the Rapport
//! server. It defines standard error types, error codes, and HTTP response
//! formatting to ensure consistent error handling across all modules and APIs.
//!
//! Malformed model output is deliberately *not* part of this taxonomy: the
//! normalizer absorbs it into a defaulted analysis document instead of
//! raising it to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    #[serde(rename = "EMPTY_TRANSCRIPT")]
    EmptyTranscript = 3001,
    #[serde(rename = "TRANSCRIPT_TOO_SHORT")]
    TranscriptTooShort = 3002,

    // Resource Management (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,

    // Upstream Model (5000-5999)
    #[serde(rename = "NETWORK_ERROR")]
    NetworkError = 5000,
    #[serde(rename = "UPSTREAM_CALL_FAILED")]
    UpstreamCallFailed = 5001,

    // Configuration (6000-6999)
    #[serde(rename = "MISSING_CREDENTIAL")]
    MissingCredential = 6000,
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6001,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9002,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput | Self::EmptyTranscript | Self::TranscriptTooShort => 400,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 502 Bad Gateway
            Self::NetworkError | Self::UpstreamCallFailed => 502,

            // 500 Internal Server Error
            Self::MissingCredential
            | Self::ConfigError
            | Self::InternalError
            | Self::DatabaseError
            | Self::SerializationError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::EmptyTranscript => "There are no chat lines to analyze",
            Self::TranscriptTooShort => "The selected chat lines are too short to analyze",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::NetworkError => "A network error occurred while calling the model service",
            Self::UpstreamCallFailed => "The model service returned an error",
            Self::MissingCredential => "No API credential is configured",
            Self::ConfigError => "Configuration error",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "A database error occurred",
            Self::SerializationError => "Data serialization or deserialization failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code_str = match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::EmptyTranscript => "EMPTY_TRANSCRIPT",
            Self::TranscriptTooShort => "TRANSCRIPT_TOO_SHORT",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UpstreamCallFailed => "UPSTREAM_CALL_FAILED",
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
        };
        write!(f, "{code_str}")
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// No caller-supplied key and no configured key
    #[must_use]
    pub fn missing_credential() -> Self {
        Self::new(
            ErrorCode::MissingCredential,
            "No API key configured; set ARK_API_KEY or supply api_key in the request",
        )
    }

    /// Transport-level failure talking to the model service
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Non-2xx status from the model service, carrying status and body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UpstreamCallFailed,
            format!("upstream returned {}: {}", status, body.into()),
        )
    }

    /// Nothing to analyze
    pub fn empty_transcript(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmptyTranscript, message)
    }

    /// Selected subset below the minimum usable length
    pub fn transcript_too_short(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TranscriptTooShort, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }
}

/// Conversion from `anyhow::Error` to `AppError`
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::EmptyTranscript.http_status(), 400);
        assert_eq!(ErrorCode::TranscriptTooShort.http_status(), 400);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::UpstreamCallFailed.http_status(), 502);
        assert_eq!(ErrorCode::MissingCredential.http_status(), 500);
    }

    #[test]
    fn test_upstream_error_carries_status_and_body() {
        let error = AppError::upstream(429, "rate limited");
        assert_eq!(error.code, ErrorCode::UpstreamCallFailed);
        assert!(error.message.contains("429"));
        assert!(error.message.contains("rate limited"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse::from(AppError::missing_credential());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["code"], "MISSING_CREDENTIAL");
    }
}
