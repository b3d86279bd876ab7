// ABOUTME: Server binary for the insight agent HTTP service
// ABOUTME: Loads configuration, builds the model backend, and serves requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Insight Agent Server Binary
//!
//! Starts the insight HTTP service: environment configuration, structured
//! logging, prompt templates, and the configured model backend.

use anyhow::Result;
use clap::Parser;
use insight_agent::{
    config::environment::ServerConfig,
    llm::{CompletionBackend, ModelBackend},
    logging,
    resources::ServerResources,
    server::HttpServer,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "insight-agent")]
#[command(about = "Personal financial insight service backed by a hosted LLM")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting insight agent");
    info!("{}", config.summary());

    // Missing endpoint identity (API key / project) is startup-fatal here.
    let backend: Arc<dyn CompletionBackend> = Arc::new(ModelBackend::from_config(&config.model)?);

    let resources = Arc::new(ServerResources::from_config(config, backend)?);

    HttpServer::new(resources).serve().await?;

    info!("Insight agent stopped");
    Ok(())
}
