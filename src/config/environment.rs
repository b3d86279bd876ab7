// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables with documented defaults and startup validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Environment-based configuration management for production deployment
//!
//! Every knob is an environment variable with a documented default; the only
//! startup-fatal condition is a missing model-endpoint identity (API key or
//! GCP project), which is validated when the model backend is constructed.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Which hosted completion endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProviderType {
    /// Google Generative Language API (API-key auth)
    #[default]
    Gemini,
    /// Vertex AI regional endpoint (service-account auth)
    Vertex,
}

impl ModelProviderType {
    /// Environment variable that selects the provider
    pub const ENV_VAR: &'static str = "INSIGHT_LLM_PROVIDER";

    /// Read the provider selection from the environment
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR).map_or(Self::Gemini, |v| match v.to_lowercase().as_str() {
            "vertex" | "vertexai" => Self::Vertex,
            "gemini" => Self::Gemini,
            other => {
                warn!(
                    "Unrecognized {}='{}', defaulting to gemini",
                    Self::ENV_VAR,
                    other
                );
                Self::Gemini
            }
        })
    }
}

impl fmt::Display for ModelProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Vertex => write!(f, "vertex"),
        }
    }
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which backend issues the completion call
    pub provider: ModelProviderType,
    /// Model identifier sent to the endpoint
    pub model: String,
    /// GCP region for the Vertex backend
    pub region: String,
    /// Maximum tokens the model may generate
    pub max_output_tokens: u32,
    /// Allowed deviation of the bucket percentage sum from 100 before rescaling
    pub bucket_sum_tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProviderType::Gemini,
            model: "gemini-2.5-flash".to_owned(),
            region: "us-central1".to_owned(),
            max_output_tokens: 8192,
            bucket_sum_tolerance: 2.0,
        }
    }
}

/// Admission-control and timeout limits, all per process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrently in-flight outbound model calls
    pub max_concurrent_calls: usize,
    /// Maximum call starts per rolling 60-second window
    pub calls_per_minute: u32,
    /// Bounded wait for admission before a request is throttled, in seconds
    pub admission_wait_secs: u64,
    /// Compaction row cap: transactions enumerated verbatim in the prompt
    pub max_transactions_per_prompt: usize,
    /// Per-attempt model call timeout, in seconds
    pub attempt_timeout_secs: u64,
    /// End-to-end request budget covering validation through retries, in seconds
    pub request_timeout_secs: u64,
}

impl LimitsConfig {
    #[must_use]
    pub const fn admission_wait(&self) -> Duration {
        Duration::from_secs(self.admission_wait_secs)
    }

    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 4,
            calls_per_minute: 30,
            admission_wait_secs: 10,
            max_transactions_per_prompt: 50,
            attempt_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

/// Retry/backoff policy knobs for the resilient model client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff multiplier applied per attempt
    pub multiplier: f64,
    /// Ceiling on any single backoff delay, in milliseconds
    pub max_delay_ms: u64,
}

impl RetryConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            multiplier: 2.0,
            max_delay_ms: 8000,
        }
    }
}

/// Response cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Wall-clock TTL for cached insight responses, in seconds
    pub ttl_secs: u64,
    /// Bounded LRU capacity
    pub max_entries: usize,
}

impl CacheSettings {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 1024,
        }
    }
}

/// Top-level server configuration assembled from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Model endpoint configuration
    pub model: ModelConfig,
    /// Admission-control limits and timeouts
    pub limits: LimitsConfig,
    /// Retry/backoff policy
    pub retry: RetryConfig,
    /// Response cache sizing
    pub cache: CacheSettings,
    /// Path to the externalized prompt template store
    pub prompts_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            log_level: LogLevel::Info,
            model: ModelConfig::default(),
            limits: LimitsConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheSettings::default(),
            prompts_path: PathBuf::from("prompts.yaml"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable. Missing
    /// variables fall back to defaults; missing endpoint identity is checked
    /// later when the model backend is constructed.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            http_port: env_parse("HTTP_PORT", defaults.http_port)?,
            log_level: LogLevel::from_str_or_default(
                &env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
            ),
            model: ModelConfig {
                provider: ModelProviderType::from_env(),
                model: env::var("INSIGHT_MODEL").unwrap_or(defaults.model.model),
                region: env::var("GCP_REGION").unwrap_or(defaults.model.region),
                max_output_tokens: env_parse("MAX_OUTPUT_TOKENS", defaults.model.max_output_tokens)?,
                bucket_sum_tolerance: env_parse(
                    "BUCKET_SUM_TOLERANCE",
                    defaults.model.bucket_sum_tolerance,
                )?,
            },
            limits: LimitsConfig {
                max_concurrent_calls: env_parse(
                    "MAX_CONCURRENT_MODEL_CALLS",
                    defaults.limits.max_concurrent_calls,
                )?,
                calls_per_minute: env_parse(
                    "MODEL_CALLS_PER_MINUTE",
                    defaults.limits.calls_per_minute,
                )?,
                admission_wait_secs: env_parse(
                    "ADMISSION_WAIT_SECS",
                    defaults.limits.admission_wait_secs,
                )?,
                max_transactions_per_prompt: env_parse(
                    "MAX_TRANSACTIONS_PER_PROMPT",
                    defaults.limits.max_transactions_per_prompt,
                )?,
                attempt_timeout_secs: env_parse(
                    "ATTEMPT_TIMEOUT_SECS",
                    defaults.limits.attempt_timeout_secs,
                )?,
                request_timeout_secs: env_parse(
                    "REQUEST_TIMEOUT_SECS",
                    defaults.limits.request_timeout_secs,
                )?,
            },
            retry: RetryConfig {
                max_attempts: env_parse("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", defaults.retry.base_delay_ms)?,
                multiplier: env_parse("RETRY_MULTIPLIER", defaults.retry.multiplier)?,
                max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms)?,
            },
            cache: CacheSettings {
                ttl_secs: env_parse("CACHE_TTL_SECS", defaults.cache.ttl_secs)?,
                max_entries: env_parse("CACHE_MAX_ENTRIES", defaults.cache.max_entries)?,
            },
            prompts_path: env::var("PROMPTS_PATH").map_or(defaults.prompts_path, PathBuf::from),
        })
    }

    /// One-line startup summary for the logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} provider={} model={} concurrency={} rpm={} cache_ttl={}s retries={}",
            self.http_port,
            self.model.provider,
            self.model.model,
            self.limits.max_concurrent_calls,
            self.limits.calls_per_minute,
            self.cache.ttl_secs,
            self.retry.max_attempts,
        )
    }
}

/// Parse an environment variable, erroring if present but malformed
fn env_parse<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::config(format!("invalid {name}='{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}
