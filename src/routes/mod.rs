// ABOUTME: Route module organization for the insight agent HTTP endpoints
// ABOUTME: Route definitions by domain with thin handlers delegating to the pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Route modules for the insight agent
//!
//! Each domain module contains route definitions and thin handler functions;
//! orchestration logic lives with the handler, component logic in the
//! respective modules.

/// Health check and readiness routes
pub mod health;
/// Insight endpoints (budget coach, spending analysis, fraud detection)
pub mod insight;

pub use health::HealthRoutes;
pub use insight::InsightRoutes;
