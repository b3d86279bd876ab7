// ABOUTME: Shared helpers for integration tests: stub backends and test resources
// ABOUTME: Builds server resources around fakes so no test touches the network
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

#![allow(dead_code)] // Each integration test binary uses a subset of these helpers

use async_trait::async_trait;
use insight_agent::cache::memory::InMemoryCache;
use insight_agent::cache::{CacheOptions, ResponseCache};
use insight_agent::config::ServerConfig;
use insight_agent::llm::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse,
    ResilientModelClient, RetryPolicy,
};
use insight_agent::prompts::PromptLibrary;
use insight_agent::rate_limiting::AdmissionGate;
use insight_agent::resources::ServerResources;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted outcome for the stub backend
#[derive(Debug, Clone)]
pub enum StubOutcome {
    /// Return this completion text
    Text(String),
    /// Fail with a transient error, optionally carrying a retry hint
    Transient(Option<Duration>),
    /// Fail with an auth error
    Auth,
    /// Fail with a malformed-request error
    InvalidRequest,
}

impl StubOutcome {
    fn into_result(self) -> Result<CompletionResponse, CompletionError> {
        match self {
            Self::Text(text) => Ok(CompletionResponse {
                text,
                model: "stub-model".to_owned(),
                usage: None,
            }),
            Self::Transient(retry_after) => Err(CompletionError::Transient {
                message: "stubbed transient failure".to_owned(),
                retry_after,
            }),
            Self::Auth => Err(CompletionError::Auth {
                message: "stubbed auth failure".to_owned(),
            }),
            Self::InvalidRequest => Err(CompletionError::InvalidRequest {
                message: "stubbed request rejection".to_owned(),
            }),
        }
    }
}

/// Instrumented completion backend driven by a script of outcomes
///
/// Pops scripted outcomes in order; once the script is exhausted, repeats the
/// fallback outcome. Tracks total calls and the maximum number of calls ever
/// in flight simultaneously.
pub struct StubBackend {
    script: Mutex<VecDeque<StubOutcome>>,
    fallback: StubOutcome,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubBackend {
    pub fn new(fallback: StubOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Prepend scripted outcomes consumed before the fallback applies
    #[must_use]
    pub fn with_script(self, outcomes: Vec<StubOutcome>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    /// Hold each call open for `delay` (for concurrency observation)
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_observed_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome.into_result()
    }
}

/// A schema-conformant spending-analysis completion
pub fn spending_payload_json() -> String {
    serde_json::json!({
        "summary": "Inflow-dominated activity with a single large deposit.",
        "top_categories": [
            {"name": "Income", "total": 250_000.0, "count": 1}
        ],
        "unusual_transactions": []
    })
    .to_string()
}

/// A schema-conformant budget-coach completion with a skewed bucket sum
pub fn coach_payload_json() -> String {
    serde_json::json!({
        "summary": "Spending is concentrated in housing and dining.",
        "budget_buckets": [
            {"name": "Housing", "percent": 30.0, "monthly_estimate": 1200.0},
            {"name": "Dining", "percent": 20.0, "monthly_estimate": 400.0},
            {"name": "Other", "percent": 10.0, "monthly_estimate": 300.0}
        ],
        "tips": [
            "Set a dining budget for the month.",
            "Automate a savings transfer after payday.",
            "Review recurring subscriptions quarterly."
        ]
    })
    .to_string()
}

/// A schema-conformant fraud-detection completion
pub fn fraud_payload_json() -> String {
    serde_json::json!({
        "findings": [],
        "overall_risk": "low",
        "summary": "No suspicious activity in the supplied window."
    })
    .to_string()
}

/// Server configuration tuned for fast tests
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.limits.admission_wait_secs = 1;
    config.limits.attempt_timeout_secs = 2;
    config.limits.request_timeout_secs = 5;
    config
}

/// Prompt library with the three shipped template names
pub fn test_prompts() -> PromptLibrary {
    PromptLibrary::from_templates(BTreeMap::from([
        (
            "budget_coach".to_owned(),
            "Coach these transactions: {transactions}".to_owned(),
        ),
        (
            "spending_analyze".to_owned(),
            "Analyze these transactions: {transactions}".to_owned(),
        ),
        (
            "fraud_detect".to_owned(),
            "Find fraud in these transactions: {transactions}".to_owned(),
        ),
    ]))
    .expect("non-empty template map")
}

/// Cache with background cleanup disabled to avoid runtime conflicts
pub fn test_cache() -> Arc<dyn ResponseCache> {
    Arc::new(InMemoryCache::new(&CacheOptions {
        max_entries: 64,
        cleanup_interval: Duration::from_secs(300),
        enable_background_cleanup: false,
    }))
}

/// Assemble server resources around a stub backend
pub fn test_resources(config: ServerConfig, backend: Arc<StubBackend>) -> Arc<ServerResources> {
    let gate = AdmissionGate::from_config(&config.limits);
    let model = ResilientModelClient::new(
        backend,
        RetryPolicy::from_config(&config.retry),
        config.limits.attempt_timeout(),
        config.model.bucket_sum_tolerance,
    );

    Arc::new(ServerResources::new(
        config,
        test_prompts(),
        test_cache(),
        gate,
        model,
    ))
}
