// ABOUTME: Runtime selection between the Gemini and Vertex completion backends
// ABOUTME: Validates endpoint identity at startup and delegates completion calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Backend Selection
//!
//! The deployment decides at startup which hosted endpoint to call via
//! `INSIGHT_LLM_PROVIDER`. Missing endpoint identity (API key or GCP
//! project) is a startup-fatal configuration error, never a per-request one.

use async_trait::async_trait;
use std::fmt;
use tracing::info;

use super::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse, GeminiClient,
    VertexClient,
};
use crate::config::{ModelConfig, ModelProviderType};
use crate::errors::AppError;

/// Unified completion backend wrapping the configured provider
pub enum ModelBackend {
    /// Generative Language API with API-key auth
    Gemini(GeminiClient),
    /// Vertex AI regional endpoint with ADC auth
    Vertex(VertexClient),
}

impl ModelBackend {
    /// Construct the configured backend, validating endpoint identity
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the selected backend's required
    /// identity (API key or project ID) is absent from the environment.
    pub fn from_config(model: &ModelConfig) -> Result<Self, AppError> {
        info!(
            "Initializing model backend: {} (set {} to change)",
            model.provider,
            ModelProviderType::ENV_VAR
        );

        let backend = match model.provider {
            ModelProviderType::Gemini => Self::Gemini(GeminiClient::from_env(&model.model)?),
            ModelProviderType::Vertex => {
                Self::Vertex(VertexClient::from_env(&model.region, &model.model)?)
            }
        };

        info!(
            "Model backend {} initialized with model: {}",
            backend.name(),
            backend.model()
        );
        Ok(backend)
    }
}

#[async_trait]
impl CompletionBackend for ModelBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Gemini(client) => client.name(),
            Self::Vertex(client) => client.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::Gemini(client) => client.model(),
            Self::Vertex(client) => client.model(),
        }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        match self {
            Self::Gemini(client) => client.complete(request).await,
            Self::Vertex(client) => client.complete(request).await,
        }
    }
}

impl fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini(_) => f.debug_tuple("ModelBackend::Gemini").finish(),
            Self::Vertex(_) => f.debug_tuple("ModelBackend::Vertex").finish(),
        }
    }
}
