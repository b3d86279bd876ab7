// ABOUTME: Resilient model client wrapping a completion backend with retries
// ABOUTME: Explicit attempt loop with capped exponential backoff and retry-after override
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Resilient Model Client
//!
//! The retry loop is an explicit small state machine (an attempt counter
//! and a computed delay) rather than nested error handlers, so the retry
//! ceiling and backoff curve are testable in isolation with a stub backend.
//!
//! Classification rules per attempt:
//!
//! - transient failures (network, 5xx, 429, per-attempt timeout) are retried
//!   with capped exponential backoff; a server-supplied retry-after hint
//!   overrides the computed delay for that attempt
//! - strict-JSON/schema failures of the model output are retried up to the
//!   same ceiling, but surface as a distinct classification on exhaustion
//! - auth and malformed-request failures surface immediately, unretried
//!
//! Backoff never sleeps past the caller's end-to-end deadline: a retry is
//! not attempted if its delay would exceed the remaining budget.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CompletionBackend, CompletionError, CompletionRequest};
use crate::config::RetryConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{InsightKind, InsightPayload};

/// Backoff policy: attempt ceiling plus the delay curve
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Base delay for the first backoff
    pub base_delay: Duration,
    /// Multiplier applied per subsequent attempt
    pub multiplier: f64,
    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
        }
    }

    /// Delay before the retry following `attempt` (1-based)
    ///
    /// Capped exponential with equal jitter: half the capped value is fixed,
    /// the other half uniformly random, keeping concurrent retries from
    /// synchronizing while preserving a floor.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64).max(0.0) as u64;

        let half = capped_ms / 2;
        let jittered = half + rand::thread_rng().gen_range(0..=capped_ms.saturating_sub(half));
        Duration::from_millis(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// What a failed attempt amounted to, for retry accounting
enum AttemptFailure {
    /// Transient endpoint failure, possibly with a server retry hint
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Model produced output that failed strict validation
    Schema { message: String },
}

impl AttemptFailure {
    const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Schema { .. } => None,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Schema { message } => message,
        }
    }
}

/// Completion backend wrapped with retries, timeouts, and output validation
pub struct ResilientModelClient {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    bucket_tolerance: f64,
}

impl ResilientModelClient {
    /// Wrap a backend with the given retry policy and per-attempt timeout
    #[must_use]
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
        bucket_tolerance: f64,
    ) -> Self {
        Self {
            backend,
            policy,
            attempt_timeout,
            bucket_tolerance,
        }
    }

    /// Name of the wrapped backend
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the completion for an endpoint variant, returning a validated,
    /// normalized payload
    ///
    /// `deadline` is the end-to-end request budget; attempts and backoff
    /// sleeps never extend past it.
    ///
    /// # Errors
    ///
    /// - `UPSTREAM_AUTH` / `INTERNAL_ERROR` immediately on non-retryable
    ///   endpoint failures
    /// - `UPSTREAM_TRANSIENT` or `UPSTREAM_SCHEMA` after the attempt ceiling
    /// - `TIMEOUT` when the remaining budget cannot absorb another attempt
    pub async fn generate(
        &self,
        kind: InsightKind,
        prompt: String,
        max_output_tokens: u32,
        deadline: Instant,
    ) -> AppResult<InsightPayload> {
        let request =
            CompletionRequest::structured(prompt, kind.response_schema(), max_output_tokens);

        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 1..=self.policy.max_attempts {
            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::timeout(format!(
                    "request budget exhausted before attempt {attempt}"
                )));
            }

            let call_timeout = self.attempt_timeout.min(deadline - now);
            let outcome =
                tokio::time::timeout(call_timeout, self.backend.complete(&request)).await;

            let failure = match outcome {
                Err(_) => AttemptFailure::Transient {
                    message: format!(
                        "model call timed out after {}ms",
                        call_timeout.as_millis()
                    ),
                    retry_after: None,
                },
                Ok(Ok(response)) => {
                    match kind.parse_response(&response.text, self.bucket_tolerance) {
                        Ok(payload) => {
                            debug!(
                                backend = self.backend.name(),
                                kind = %kind,
                                attempt,
                                "model call succeeded"
                            );
                            return Ok(payload);
                        }
                        Err(schema_error) => AttemptFailure::Schema {
                            message: schema_error.message,
                        },
                    }
                }
                Ok(Err(CompletionError::Auth { message })) => {
                    return Err(AppError::upstream_auth(message));
                }
                Ok(Err(CompletionError::InvalidRequest { message })) => {
                    return Err(AppError::internal(format!(
                        "model endpoint rejected request: {message}"
                    )));
                }
                Ok(Err(CompletionError::Transient {
                    message,
                    retry_after,
                })) => AttemptFailure::Transient {
                    message,
                    retry_after,
                },
            };

            warn!(
                backend = self.backend.name(),
                kind = %kind,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = failure.message(),
                "model call attempt failed"
            );

            if attempt == self.policy.max_attempts {
                last_failure = Some(failure);
                break;
            }

            let delay = failure
                .retry_after()
                .unwrap_or_else(|| self.policy.delay_for(attempt));

            if Instant::now() + delay >= deadline {
                return Err(AppError::timeout(format!(
                    "backoff of {}ms would exceed the remaining request budget",
                    delay.as_millis()
                )));
            }

            last_failure = Some(failure);
            tokio::time::sleep(delay).await;
        }

        match last_failure {
            Some(AttemptFailure::Schema { message }) => Err(AppError::upstream_schema(format!(
                "model output failed validation after {} attempts: {message}",
                self.policy.max_attempts
            ))),
            Some(AttemptFailure::Transient { message, .. }) => {
                Err(AppError::upstream_transient(format!(
                    "model endpoint failed after {} attempts: {message}",
                    self.policy.max_attempts
                )))
            }
            // Unreachable with max_attempts >= 1; classify conservatively.
            None => Err(AppError::upstream_transient("no model call attempted")),
        }
    }
}
