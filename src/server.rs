// ABOUTME: HTTP server assembly: router, middleware stack, and bind/serve loop
// ABOUTME: Wires the shared resources into axum with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! HTTP server bootstrap
//!
//! Assembles the route tree and middleware stack around the shared
//! [`ServerResources`] and serves until a shutdown signal arrives.

use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;
use crate::routes::{HealthRoutes, InsightRoutes};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Cap on inbound request bodies (transaction lists are small)
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Insight agent HTTP server
pub struct HttpServer {
    resources: Arc<ServerResources>,
}

impl HttpServer {
    /// Create a server around shared resources
    #[must_use]
    pub fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the full router with middleware applied
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .merge(HealthRoutes::routes())
            .merge(InsightRoutes::routes(self.resources.clone()))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                    .layer(CorsLayer::permissive()),
            )
    }

    /// Bind and serve until shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn serve(self) -> AppResult<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.resources.config.http_port));
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("failed to bind {addr}: {e}")))?;

        info!("Insight agent listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::internal(format!("server error: {e}")))
    }
}

/// Resolve when the process receives a shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
