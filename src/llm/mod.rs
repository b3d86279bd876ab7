// ABOUTME: Completion backend abstraction for hosted generative-AI endpoints
// ABOUTME: Defines the backend contract and the classified completion error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Model Client Layer
//!
//! This module defines the contract a completion backend must implement and
//! the classified error type the retry loop consumes. Backends are thin wire
//! adapters: they issue exactly one HTTP call per `complete` invocation and
//! classify the outcome. All retry, backoff, and schema-validation logic
//! lives in [`resilient::ResilientModelClient`], which works against the
//! trait so tests can inject a fake transport.

/// Runtime backend selection
pub mod backend;
/// Google Generative Language API backend (API-key auth)
pub mod gemini;
/// Retry/backoff wrapper with strict output validation
pub mod resilient;
/// Vertex AI backend (service-account auth)
pub mod vertex;
/// Wire types shared by the Gemini-family endpoints
pub(crate) mod wire;

pub use backend::ModelBackend;
pub use gemini::GeminiClient;
pub use resilient::{ResilientModelClient, RetryPolicy};
pub use vertex::VertexClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A single completion request: prompt text plus output constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Fully resolved prompt text
    pub prompt: String,
    /// JSON schema hint for the endpoint's structured-output mode
    pub response_schema: serde_json::Value,
    /// Maximum tokens the model may generate
    pub max_output_tokens: u32,
    /// Sampling temperature; insight endpoints pin this to 0.0
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build a deterministic (temperature 0) structured-output request
    #[must_use]
    pub fn structured(
        prompt: String,
        response_schema: serde_json::Value,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            prompt,
            response_schema,
            max_output_tokens,
            temperature: 0.0,
        }
    }
}

/// Token usage statistics reported by the endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Raw completion output before schema validation
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Completion text as returned by the endpoint
    pub text: String,
    /// Model that produced the completion
    pub model: String,
    /// Token usage if the endpoint reported it
    pub usage: Option<TokenUsage>,
}

/// Classified failure from a single completion attempt
///
/// The classification drives retry behavior: only `Transient` failures are
/// retried; `Auth` and `InvalidRequest` surface immediately.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network failure, 5xx, or 429; retryable with backoff
    #[error("transient model endpoint failure: {message}")]
    Transient {
        message: String,
        /// Server-supplied retry hint, overriding computed backoff
        retry_after: Option<Duration>,
    },
    /// Authentication/authorization failure (401/403); never retried
    #[error("model endpoint rejected credentials: {message}")]
    Auth { message: String },
    /// Malformed request (4xx other than 429/401/403); never retried
    #[error("model endpoint rejected request: {message}")]
    InvalidRequest { message: String },
}

impl CompletionError {
    /// Classify an HTTP status plus response detail into a completion error
    #[must_use]
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => Self::Auth { message },
            429 => Self::Transient {
                message,
                retry_after,
            },
            400..=499 => Self::InvalidRequest { message },
            _ => Self::Transient {
                message,
                retry_after,
            },
        }
    }

    /// Whether the retry loop may attempt this call again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Completion backend contract
///
/// One implementation per hosted endpoint, plus stubs in tests. A backend
/// performs exactly one outbound call per invocation and never retries
/// internally.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Unique backend identifier (e.g. "gemini", "vertex")
    fn name(&self) -> &'static str;

    /// Model identifier used when the request does not override it
    fn model(&self) -> &str;

    /// Issue a single completion call
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, CompletionError>;
}
