// ABOUTME: Vertex AI completion backend for GCP-native Gemini access
// ABOUTME: Uses Application Default Credentials, suited to in-cluster deployments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Vertex AI Backend
//!
//! Completion backend for the Vertex AI regional endpoints, authenticating
//! via Application Default Credentials: the GCP metadata server in-cluster,
//! with a `gcloud` CLI fallback for local development.
//!
//! ## Configuration
//!
//! - `GCP_PROJECT_ID`: required (startup-fatal if absent)
//! - `GCP_REGION`: optional, defaults to `us-central1`

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::wire::{classify_http_failure, GenerateRequest, GenerateResponse};
use super::{CompletionBackend, CompletionError, CompletionRequest, CompletionResponse};
use crate::errors::{AppError, ErrorCode};

/// Environment variable for the GCP project ID
const GCP_PROJECT_ID_ENV: &str = "GCP_PROJECT_ID";

/// Token refresh buffer: refresh 5 minutes before expiry
const TOKEN_REFRESH_BUFFER_SECS: u64 = 300;

/// Cached access token with expiry tracking
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Response from the GCP metadata server token endpoint
#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

/// GCP access token provider using Application Default Credentials
struct GcpAuth {
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    client: Client,
}

impl GcpAuth {
    fn new(client: Client) -> Self {
        Self {
            cached_token: Arc::new(RwLock::new(None)),
            client,
        }
    }

    /// Get a valid access token, refreshing if necessary
    async fn get_token(&self) -> Result<String, CompletionError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref cached) = *cache {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.fetch_new_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                // GCP tokens are valid for 1 hour
                expires_at: Instant::now() + Duration::from_secs(3600 - TOKEN_REFRESH_BUFFER_SECS),
            });
        }

        Ok(token)
    }

    /// Fetch a new access token from the metadata server or gcloud CLI
    async fn fetch_new_token(&self) -> Result<String, CompletionError> {
        if let Ok(token) = self.fetch_from_metadata_server().await {
            debug!("Obtained GCP token from metadata server");
            return Ok(token);
        }

        if let Ok(token) = self.fetch_from_gcloud_cli().await {
            debug!("Obtained GCP token from gcloud CLI");
            return Ok(token);
        }

        Err(CompletionError::Auth {
            message: "Failed to obtain GCP access token. In-cluster this should be automatic; \
                      locally, run: gcloud auth application-default login"
                .to_owned(),
        })
    }

    /// Fetch a token from the GCP metadata server (GKE, Cloud Run, GCE)
    async fn fetch_from_metadata_server(&self) -> Result<String, CompletionError> {
        let url = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| CompletionError::Auth {
                message: format!("Metadata server request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(CompletionError::Auth {
                message: "Metadata server returned error".to_owned(),
            });
        }

        let token_response: MetadataTokenResponse =
            response.json().await.map_err(|e| CompletionError::Auth {
                message: format!("Failed to parse token response: {e}"),
            })?;

        Ok(token_response.access_token)
    }

    /// Fetch a token using the gcloud CLI (local development)
    async fn fetch_from_gcloud_cli(&self) -> Result<String, CompletionError> {
        let output = TokioCommand::new("gcloud")
            .args(["auth", "application-default", "print-access-token"])
            .output()
            .await
            .map_err(|e| CompletionError::Auth {
                message: format!("Failed to run gcloud: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompletionError::Auth {
                message: format!("gcloud auth failed: {stderr}"),
            });
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if token.is_empty() {
            return Err(CompletionError::Auth {
                message: "gcloud returned empty token".to_owned(),
            });
        }

        Ok(token)
    }
}

/// Vertex AI completion backend
pub struct VertexClient {
    project_id: String,
    region: String,
    client: Client,
    auth: GcpAuth,
    model: String,
}

impl VertexClient {
    /// Create a backend with explicit project, region, and model
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = Client::new();
        Self {
            project_id: project_id.into(),
            region: region.into(),
            auth: GcpAuth::new(client.clone()),
            client,
            model: model.into(),
        }
    }

    /// Create a backend from `GCP_PROJECT_ID` in the environment
    ///
    /// # Errors
    ///
    /// Returns a startup-fatal configuration error if `GCP_PROJECT_ID` is
    /// not set.
    pub fn from_env(region: impl Into<String>, model: impl Into<String>) -> Result<Self, AppError> {
        let project_id = env::var(GCP_PROJECT_ID_ENV).map_err(|_| {
            AppError::new(
                ErrorCode::ConfigMissing,
                format!("{GCP_PROJECT_ID_ENV} environment variable not set (required for Vertex AI)"),
            )
        })?;

        let region = region.into();
        info!(
            "Initializing Vertex AI backend for project '{}' in region '{}'",
            project_id, region
        );

        Ok(Self::new(project_id, region, model))
    }

    /// Build the regional generateContent URL for the configured model
    fn build_url(&self) -> String {
        format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:generateContent",
            region = self.region,
            project = self.project_id,
            model = self.model,
        )
    }
}

#[async_trait]
impl CompletionBackend for VertexClient {
    fn name(&self) -> &'static str {
        "vertex"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let token = self.auth.get_token().await?;
        let body = GenerateRequest::from_completion(request);

        debug!(model = %self.model, region = %self.region, "Sending request to Vertex AI");

        let response = self
            .client
            .post(self.build_url())
            .bearer_auth(token)
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
            error!(status = %status, "Vertex AI error");
            return Err(classify_http_failure(
                status.as_u16(),
                retry_after,
                &response_text,
            ));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&response_text).map_err(|e| CompletionError::Transient {
                message: format!("Failed to parse Vertex response: {e}"),
                retry_after: None,
            })?;

        if let Some(api_error) = parsed.error {
            return Err(CompletionError::Transient {
                message: format!("Vertex AI error: {}", api_error.message),
                retry_after: None,
            });
        }

        let text = parsed.first_text().ok_or_else(|| CompletionError::Transient {
            message: "No content in Vertex response".to_owned(),
            retry_after: None,
        })?;

        Ok(CompletionResponse {
            text,
            model: self.model.clone(),
            usage: parsed.token_usage(),
        })
    }
}

impl Debug for VertexClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VertexClient")
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
