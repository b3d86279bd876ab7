// ABOUTME: Insight route handlers orchestrating the validate-compact-cache-call pipeline
// ABOUTME: Validates inbound payloads and attaches prompt provenance to responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Insight endpoints
//!
//! All three endpoint variants share one orchestration path:
//!
//! `Validate → Compact → Resolve prompt → Fingerprint → Cache check →
//! (hit: respond) | (miss: Admit → Call → Cache → respond)`
//!
//! Stages run strictly in that order and no request revisits an earlier
//! stage. Validation happens before any downstream component is touched;
//! malformed input never reaches the compactor, the gate, or the model
//! client. Successful responses carry the `X-Insight-Prompt` provenance
//! header; failures never do.

use crate::cache::{Fingerprint, ResponseCache};
use crate::errors::{AppError, AppResult};
use crate::ledger::CompactedLedger;
use crate::models::{InsightKind, InsightPayload, Transaction};
use crate::resources::ServerResources;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Response header carrying `<promptName>@<8-hex content hash>` provenance
pub const INSIGHT_PROMPT_HEADER: &str = "x-insight-prompt";

/// Date format accepted on inbound transactions
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Insight routes handler
pub struct InsightRoutes;

impl InsightRoutes {
    /// Create all insight routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/budget/coach", post(Self::budget_coach))
            .route("/api/spending/analyze", post(Self::spending_analyze))
            .route("/api/fraud/detect", post(Self::fraud_detect))
            .with_state(resources)
    }

    async fn budget_coach(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Result<Response, AppError> {
        Self::handle_insight(&resources, InsightKind::BudgetCoach, &body).await
    }

    async fn spending_analyze(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Result<Response, AppError> {
        Self::handle_insight(&resources, InsightKind::SpendingAnalyze, &body).await
    }

    async fn fraud_detect(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Result<Response, AppError> {
        Self::handle_insight(&resources, InsightKind::FraudDetect, &body).await
    }

    /// Validate, orchestrate the pipeline under the request budget, and
    /// attach provenance to the response
    async fn handle_insight(
        resources: &Arc<ServerResources>,
        kind: InsightKind,
        body: &[u8],
    ) -> Result<Response, AppError> {
        let transactions = parse_transactions(body)?;

        let deadline = Instant::now() + resources.config.limits.request_timeout();
        let (payload, provenance) = tokio::time::timeout_at(
            deadline,
            Self::run_pipeline(resources, kind, &transactions, deadline),
        )
        .await
        .map_err(|_| AppError::timeout("insight request exceeded its end-to-end budget"))??;

        let header_value = HeaderValue::from_str(&provenance)
            .map_err(|e| AppError::internal(format!("provenance header: {e}")))?;

        let mut response = (StatusCode::OK, Json(payload)).into_response();
        response
            .headers_mut()
            .insert(INSIGHT_PROMPT_HEADER, header_value);
        Ok(response)
    }

    /// The post-validation pipeline: compact, resolve, cache, admit, call
    async fn run_pipeline(
        resources: &Arc<ServerResources>,
        kind: InsightKind,
        transactions: &[Transaction],
        deadline: Instant,
    ) -> AppResult<(InsightPayload, String)> {
        let ledger = CompactedLedger::compact(
            transactions,
            resources.config.limits.max_transactions_per_prompt,
        );

        let prompt = resources.prompts.resolve(kind.prompt_name())?;
        let fingerprint = Fingerprint::compute(prompt, &ledger)?;

        if let Some(cached) = resources.cache.get(&fingerprint).await? {
            debug!(kind = %kind, "insight cache hit");
            return Ok((cached, prompt.provenance()));
        }

        // Admission happens after the cache check so hits never consume a
        // model-call slot; the permit is held across retries.
        let _permit = resources.gate.admit().await?;

        let ledger_json = ledger
            .to_canonical_json()
            .map_err(|e| AppError::internal(format!("ledger serialization: {e}")))?;
        let rendered = prompt.render(&ledger_json);

        let payload = resources
            .model
            .generate(
                kind,
                rendered,
                resources.config.model.max_output_tokens,
                deadline,
            )
            .await?;

        resources
            .cache
            .put(&fingerprint, &payload, resources.config.cache.ttl())
            .await?;

        Ok((payload, prompt.provenance()))
    }
}

/// Validate the inbound request shape and extract transactions
///
/// Every check maps to a classified 400-class error; nothing downstream is
/// touched on failure. An empty `transactions` array is valid.
fn parse_transactions(body: &[u8]) -> AppResult<Vec<Transaction>> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::invalid_input(format!("request body is not valid JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(AppError::invalid_input("request body must be a JSON object"));
    };

    let Some(transactions) = object.get("transactions") else {
        return Err(AppError::missing_field("transactions"));
    };

    let Some(items) = transactions.as_array() else {
        return Err(AppError::invalid_format("'transactions' must be an array"));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_transaction(index, item))
        .collect()
}

/// Validate a single transaction entry
fn parse_transaction(index: usize, item: &serde_json::Value) -> AppResult<Transaction> {
    let Some(entry) = item.as_object() else {
        return Err(AppError::invalid_format(format!(
            "transactions[{index}] must be an object"
        )));
    };

    let date_raw = entry
        .get("date")
        .ok_or_else(|| AppError::missing_field(&format!("transactions[{index}].date")))?
        .as_str()
        .ok_or_else(|| {
            AppError::invalid_format(format!("transactions[{index}].date must be a string"))
        })?;
    let date = NaiveDate::parse_from_str(date_raw, DATE_FORMAT).map_err(|_| {
        AppError::invalid_format(format!(
            "transactions[{index}].date '{date_raw}' is not a YYYY-MM-DD calendar date"
        ))
    })?;

    let label = entry
        .get("label")
        .ok_or_else(|| AppError::missing_field(&format!("transactions[{index}].label")))?
        .as_str()
        .ok_or_else(|| {
            AppError::invalid_format(format!("transactions[{index}].label must be a string"))
        })?;
    if label.trim().is_empty() {
        return Err(AppError::invalid_format(format!(
            "transactions[{index}].label must be non-empty"
        )));
    }

    let amount_value = entry
        .get("amount")
        .ok_or_else(|| AppError::missing_field(&format!("transactions[{index}].amount")))?;
    let amount = amount_value.as_f64().ok_or_else(|| {
        AppError::invalid_format(format!("transactions[{index}].amount must be numeric"))
    })?;

    Ok(Transaction {
        date,
        label: label.to_owned(),
        amount,
    })
}
