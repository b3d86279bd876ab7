// ABOUTME: Request/response wire types for the Gemini-family generateContent endpoints
// ABOUTME: Shared by the API-key and Vertex backends, which differ only in URL and auth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

use super::{CompletionError, CompletionRequest, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// generateContent request body
#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// Build a JSON-mode request from a completion request
    pub fn from_completion(request: &CompletionRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                candidate_count: 1,
                response_mime_type: "application/json".to_owned(),
                response_schema: request.response_schema.clone(),
            },
        }
    }
}

/// Content block holding text parts
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// A single text part
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Part {
    pub text: String,
}

/// Generation configuration forcing strict-JSON output
#[derive(Debug, Serialize)]
pub(crate) struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
    #[serde(rename = "candidateCount")]
    pub candidate_count: u32,
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
    #[serde(rename = "responseSchema")]
    pub response_schema: serde_json::Value,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub candidates: Option<Vec<Candidate>>,
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
    pub error: Option<ApiError>,
}

impl GenerateResponse {
    /// Extract the first candidate's text, if any
    pub fn first_text(&self) -> Option<String> {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
    }

    /// Convert usage metadata to the layer-neutral form
    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.usage_metadata.as_ref().map(|m| TokenUsage {
            prompt_tokens: m.prompt.unwrap_or(0),
            completion_tokens: m.candidates.unwrap_or(0),
            total_tokens: m.total.unwrap_or(0),
        })
    }
}

/// Response candidate
#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<Content>,
}

/// Usage metadata block
#[derive(Debug, Deserialize)]
pub(crate) struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    pub prompt: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    pub candidates: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    pub total: Option<u32>,
}

/// Error payload the endpoint may embed in a response body
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub message: String,
}

/// Classify an unsuccessful HTTP response from a Gemini-family endpoint
///
/// Pulls the error message out of the JSON body when present, honors a
/// `Retry-After` header, and falls back to the quota hint Gemini embeds in
/// 429 messages ("Please retry in 6.4s.").
pub(crate) fn classify_http_failure(
    status: u16,
    retry_after_header: Option<Duration>,
    body: &str,
) -> CompletionError {
    let message = serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map_or_else(|| body.to_owned(), |e| e.message);

    let retry_after = retry_after_header.or_else(|| parse_retry_hint(&message));

    CompletionError::from_status(status, message, retry_after)
}

/// Parse the "Please retry in <seconds>s" hint out of a quota error message
fn parse_retry_hint(message: &str) -> Option<Duration> {
    let after_prefix = message.split("Please retry in ").nth(1)?;
    let seconds_str = after_prefix.split('s').next()?;
    let seconds: f64 = seconds_str.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_hint_parsing() {
        let hint = parse_retry_hint("Quota exceeded. Please retry in 6.406453963s.");
        assert_eq!(hint, Some(Duration::from_secs_f64(6.406_453_963)));
        assert_eq!(parse_retry_hint("no hint here"), None);
    }

    #[test]
    fn test_classify_prefers_header_hint() {
        let err = classify_http_failure(
            429,
            Some(Duration::from_secs(12)),
            r#"{"error":{"message":"Please retry in 3s."}}"#,
        );
        let CompletionError::Transient { retry_after, .. } = err else {
            panic!("429 must classify as transient");
        };
        assert_eq!(retry_after, Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_body_message_extracted() {
        let err = classify_http_failure(400, None, r#"{"error":{"message":"bad schema"}}"#);
        let CompletionError::InvalidRequest { message } = err else {
            panic!("400 must classify as invalid request");
        };
        assert_eq!(message, "bad schema");
    }
}
