// ABOUTME: Configuration module for environment-supplied runtime settings
// ABOUTME: All tunables come from the environment with documented defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

/// Environment-based configuration management
pub mod environment;

pub use environment::{
    CacheSettings, LimitsConfig, LogLevel, ModelConfig, ModelProviderType, RetryConfig,
    ServerConfig,
};
