// ABOUTME: Google Generative Language API backend using API-key authentication
// ABOUTME: Issues one JSON-mode generateContent call per completion request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Gemini Backend
//!
//! Completion backend for Google's Generative Language API (AI Studio keys).
//!
//! ## Configuration
//!
//! Set the `GEMINI_API_KEY` environment variable with a key from Google AI
//! Studio. The model identifier comes from service configuration
//! (`INSIGHT_MODEL`).

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use super::wire::{classify_http_failure, GenerateRequest, GenerateResponse};
use super::{CompletionBackend, CompletionError, CompletionRequest, CompletionResponse};
use crate::errors::{AppError, ErrorCode};

/// Environment variable for the API key
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Base URL for the Generative Language API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API completion backend
pub struct GeminiClient {
    api_key: String,
    client: Client,
    model: String,
}

impl GeminiClient {
    /// Create a backend with an explicit API key and model
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Create a backend from the `GEMINI_API_KEY` environment variable
    ///
    /// # Errors
    ///
    /// Returns a startup-fatal configuration error if the variable is not
    /// set.
    pub fn from_env(model: impl Into<String>) -> Result<Self, AppError> {
        let api_key = env::var(GEMINI_API_KEY_ENV).map_err(|_| {
            AppError::new(
                ErrorCode::ConfigMissing,
                format!("{GEMINI_API_KEY_ENV} environment variable not set"),
            )
        })?;
        Ok(Self::new(api_key, model))
    }

    /// Build the API URL for the configured model
    fn build_url(&self) -> String {
        format!(
            "{API_BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let body = GenerateRequest::from_completion(request);

        debug!(model = %self.model, "Sending request to Gemini API");

        let response = self
            .client
            .post(self.build_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transient {
                message: format!("HTTP request failed: {e}"),
                retry_after: None,
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let response_text = response
            .text()
            .await
            .map_err(|e| CompletionError::Transient {
                message: format!("Failed to read response: {e}"),
                retry_after: None,
            })?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(classify_http_failure(
                status.as_u16(),
                retry_after,
                &response_text,
            ));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&response_text).map_err(|e| CompletionError::Transient {
                message: format!("Failed to parse Gemini response: {e}"),
                retry_after: None,
            })?;

        if let Some(api_error) = parsed.error {
            return Err(CompletionError::Transient {
                message: format!("Gemini API error: {}", api_error.message),
                retry_after: None,
            });
        }

        let text = parsed.first_text().ok_or_else(|| CompletionError::Transient {
            message: "No content in Gemini response".to_owned(),
            retry_after: None,
        })?;

        debug!("Successfully received Gemini response");

        Ok(CompletionResponse {
            text,
            model: self.model.clone(),
            usage: parsed.token_usage(),
        })
    }
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
