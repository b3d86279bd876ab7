// ABOUTME: Unified error handling with standard error codes and HTTP response mapping
// ABOUTME: Classifies every failure before it leaves the request handler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Unified Error Handling System
//!
//! This module provides the centralized error taxonomy for the insight agent.
//! Every failure is classified into an [`ErrorCode`] before it crosses the
//! HTTP boundary; handlers never leak raw error detail. Failure responses are
//! always JSON with a human-readable `message` field.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Inbound validation (1000-1999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 1000,
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField = 1001,
    #[serde(rename = "INVALID_FORMAT")]
    InvalidFormat = 1002,

    // Configuration (2000-2999)
    #[serde(rename = "PROMPT_NOT_FOUND")]
    PromptNotFound = 2000,
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 2001,
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 2002,

    // Admission control (3000-3999)
    #[serde(rename = "THROTTLED")]
    Throttled = 3000,

    // Upstream model endpoint (4000-4999)
    #[serde(rename = "UPSTREAM_TRANSIENT")]
    UpstreamTransient = 4000,
    #[serde(rename = "UPSTREAM_AUTH")]
    UpstreamAuth = 4001,
    #[serde(rename = "UPSTREAM_SCHEMA")]
    UpstreamSchema = 4002,

    // Request lifecycle (5000-5999)
    #[serde(rename = "TIMEOUT")]
    Timeout = 5000,

    // Internal (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput
            | Self::MissingRequiredField
            | Self::InvalidFormat
            | Self::PromptNotFound => 400,

            // 429 Too Many Requests
            Self::Throttled => 429,

            // 502 Bad Gateway
            Self::UpstreamTransient | Self::UpstreamAuth | Self::UpstreamSchema => 502,

            // 504 Gateway Timeout
            Self::Timeout => 504,

            // 500 Internal Server Error
            Self::ConfigError | Self::ConfigMissing | Self::InternalError => 500,
        }
    }

    /// Get a user-facing description of this error class
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::InvalidFormat => "The data format is invalid",
            Self::PromptNotFound => "The requested prompt template does not exist",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigMissing => "Required configuration is missing",
            Self::Throttled => "Too many concurrent insight requests; try again shortly",
            Self::UpstreamTransient => "The model endpoint is temporarily unavailable",
            Self::UpstreamAuth => "Authentication with the model endpoint failed",
            Self::UpstreamSchema => "The model returned output that failed validation",
            Self::Timeout => "The request exceeded its time budget",
            Self::InternalError => "An internal server error occurred",
        }
    }

    /// Whether the caller may reasonably retry the same request later
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Throttled | Self::UpstreamTransient | Self::UpstreamSchema | Self::Timeout
        )
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Additional key-value context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
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
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a request ID to the error context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Add structured details to the error context
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = Some(details);
        self
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                request_id: error.context.request_id,
                details: error.context.details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        match self.code {
            ErrorCode::UpstreamAuth => {
                tracing::error!(code = ?self.code, message = %self.message, "model endpoint auth failure");
            }
            ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::PromptNotFound => {
                tracing::debug!(code = ?self.code, message = %self.message, "request rejected");
            }
            _ => {
                tracing::warn!(code = ?self.code, message = %self.message, "request failed");
            }
        }

        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing required field
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("missing required field '{field}'"),
        )
    }

    /// Invalid field format
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFormat, message)
    }

    /// Unknown prompt template
    pub fn prompt_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::PromptNotFound,
            format!("no prompt template named '{name}'"),
        )
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Admission gate rejection after bounded wait
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Throttled, message)
    }

    /// Transient upstream failure surfaced after retry exhaustion
    pub fn upstream_transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTransient, message)
    }

    /// Upstream authentication/authorization failure
    pub fn upstream_auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamAuth, message)
    }

    /// Model output failed strict schema validation, retries exhausted
    pub fn upstream_schema(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamSchema, message)
    }

    /// End-to-end request budget exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Conversion from anyhow::Error for binary/bootstrap glue
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}
