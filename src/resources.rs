// ABOUTME: Dependency-injection bundle shared by all request handlers
// ABOUTME: Owns the prompt library, cache, admission gate, and model client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Focused dependency injection for the request pipeline
//!
//! Shared mutable state (the admission gate's counters and the response
//! cache) is owned here and passed by handle into handlers, never reached
//! through globals, so unit tests can assemble resources around fakes.

use crate::cache::memory::InMemoryCache;
use crate::cache::{CacheOptions, ResponseCache};
use crate::config::ServerConfig;
use crate::errors::AppResult;
use crate::llm::{CompletionBackend, ResilientModelClient, RetryPolicy};
use crate::prompts::PromptLibrary;
use crate::rate_limiting::AdmissionGate;
use std::sync::Arc;

/// Everything a request handler needs, assembled once at startup
pub struct ServerResources {
    /// Environment-derived configuration
    pub config: ServerConfig,
    /// Immutable prompt template library
    pub prompts: PromptLibrary,
    /// Shared response cache
    pub cache: Arc<dyn ResponseCache>,
    /// Outbound-call admission gate
    pub gate: AdmissionGate,
    /// Retry-wrapped model client
    pub model: ResilientModelClient,
}

impl ServerResources {
    /// Assemble resources from explicit parts (used by tests with fakes)
    #[must_use]
    pub fn new(
        config: ServerConfig,
        prompts: PromptLibrary,
        cache: Arc<dyn ResponseCache>,
        gate: AdmissionGate,
        model: ResilientModelClient,
    ) -> Self {
        Self {
            config,
            prompts,
            cache,
            gate,
            model,
        }
    }

    /// Assemble production resources around a completion backend
    ///
    /// Loads the prompt library from the configured path and builds the
    /// cache, gate, and resilient client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the prompt store cannot be loaded.
    pub fn from_config(
        config: ServerConfig,
        backend: Arc<dyn CompletionBackend>,
    ) -> AppResult<Self> {
        let prompts = PromptLibrary::load(&config.prompts_path)?;

        let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryCache::new(&CacheOptions {
            max_entries: config.cache.max_entries,
            ..CacheOptions::default()
        }));

        let gate = AdmissionGate::from_config(&config.limits);

        let model = ResilientModelClient::new(
            backend,
            RetryPolicy::from_config(&config.retry),
            config.limits.attempt_timeout(),
            config.model.bucket_sum_tolerance,
        );

        Ok(Self::new(config, prompts, cache, gate, model))
    }
}
