// ABOUTME: Domain data models for transactions and model-produced insight payloads
// ABOUTME: Includes strict-JSON parsing and percentage normalization of model output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Common data models for the insight pipeline
//!
//! Inbound [`Transaction`]s are immutable once received and live only for the
//! request. Model output is parsed strictly against the per-endpoint payload
//! shape; anything that fails to parse is rejected and retried upstream,
//! never passed through to the caller.

use crate::errors::{AppError, AppResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bank transaction as supplied by the upstream transaction source
///
/// `amount` is signed: positive values are inflows, negative values outflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Calendar date of the transaction
    pub date: NaiveDate,
    /// Free-text counterparty label
    pub label: String,
    /// Signed amount (positive = inflow, negative = outflow)
    pub amount: f64,
}

/// The endpoint variants sharing the insight pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Budget coaching: summary, percentage buckets, tips
    BudgetCoach,
    /// Spending analysis: summary, top categories, unusual transactions
    SpendingAnalyze,
    /// Fraud detection: per-transaction findings and overall risk
    FraudDetect,
}

impl InsightKind {
    /// Name of the prompt template backing this endpoint
    #[must_use]
    pub const fn prompt_name(self) -> &'static str {
        match self {
            Self::BudgetCoach => "budget_coach",
            Self::SpendingAnalyze => "spending_analyze",
            Self::FraudDetect => "fraud_detect",
        }
    }

    /// JSON schema hint forwarded to the completion endpoint
    #[must_use]
    pub fn response_schema(self) -> serde_json::Value {
        match self {
            Self::BudgetCoach => serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "budget_buckets": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "percent": {"type": "number"},
                                "monthly_estimate": {"type": "number"}
                            },
                            "required": ["name", "percent", "monthly_estimate"]
                        }
                    },
                    "tips": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["summary", "budget_buckets", "tips"]
            }),
            Self::SpendingAnalyze => serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "top_categories": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "total": {"type": "number"},
                                "count": {"type": "integer"}
                            },
                            "required": ["name", "total", "count"]
                        }
                    },
                    "unusual_transactions": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["summary", "top_categories", "unusual_transactions"]
            }),
            Self::FraudDetect => serde_json::json!({
                "type": "object",
                "properties": {
                    "findings": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "transaction": {"type": "object"},
                                "risk_score": {"type": "number"},
                                "reason": {"type": "string"},
                                "recommendation": {"type": "string"}
                            },
                            "required": ["transaction", "risk_score", "reason", "recommendation"]
                        }
                    },
                    "overall_risk": {"type": "string"},
                    "summary": {"type": "string"}
                },
                "required": ["findings", "overall_risk", "summary"]
            }),
        }
    }

    /// Parse raw model output into a validated, normalized payload
    ///
    /// The text must be strict JSON for this endpoint's shape (code fences are
    /// tolerated and stripped). Any parse or shape failure is an
    /// `UPSTREAM_SCHEMA` error, which the resilient client treats as
    /// retryable.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not valid JSON for this endpoint's
    /// payload shape or fails semantic validation.
    pub fn parse_response(self, raw: &str, bucket_tolerance: f64) -> AppResult<InsightPayload> {
        let cleaned = strip_code_fences(raw);

        match self {
            Self::BudgetCoach => {
                let mut insight: CoachInsight = parse_strict(cleaned)?;
                insight.validate()?;
                insight.normalize_buckets(bucket_tolerance);
                Ok(InsightPayload::Coach(insight))
            }
            Self::SpendingAnalyze => {
                let insight: SpendingInsight = parse_strict(cleaned)?;
                insight.validate()?;
                Ok(InsightPayload::Spending(insight))
            }
            Self::FraudDetect => {
                let insight: FraudInsight = parse_strict(cleaned)?;
                insight.validate()?;
                Ok(InsightPayload::Fraud(insight))
            }
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prompt_name())
    }
}

/// A named budget bucket with a percentage share and currency estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetBucket {
    /// Bucket name (e.g. "Groceries")
    pub name: String,
    /// Share of spending, normalized so all buckets sum to ~100
    pub percent: f64,
    /// Estimated monthly amount in account currency
    pub monthly_estimate: f64,
}

/// Budget coaching payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoachInsight {
    /// Natural-language summary of spending patterns
    pub summary: String,
    /// Named percentage buckets
    pub budget_buckets: Vec<BudgetBucket>,
    /// Short actionable tips, bounded count
    pub tips: Vec<String>,
}

/// Maximum number of tips a coach payload may carry
const MAX_TIPS: usize = 5;

impl CoachInsight {
    fn validate(&self) -> AppResult<()> {
        if self.summary.trim().is_empty() {
            return Err(AppError::upstream_schema("empty summary in model output"));
        }
        if self.tips.is_empty() || self.tips.len() > MAX_TIPS {
            return Err(AppError::upstream_schema(format!(
                "expected 1..={MAX_TIPS} tips, got {}",
                self.tips.len()
            )));
        }
        for bucket in &self.budget_buckets {
            if !bucket.percent.is_finite() || bucket.percent < 0.0 {
                return Err(AppError::upstream_schema(format!(
                    "bucket '{}' has invalid percentage {}",
                    bucket.name, bucket.percent
                )));
            }
        }
        Ok(())
    }

    /// Rescale bucket percentages so they sum to ~100
    ///
    /// A presentation-layer guarantee only. Sums already within `tolerance`
    /// of 100 pass through untouched; anything else is rescaled by
    /// `100 / sum`. A zero/absent bucket set is left alone.
    pub fn normalize_buckets(&mut self, tolerance: f64) {
        let sum: f64 = self.budget_buckets.iter().map(|b| b.percent).sum();
        if self.budget_buckets.is_empty() || sum <= 0.0 {
            return;
        }
        if (sum - 100.0).abs() > tolerance {
            let scale = 100.0 / sum;
            for bucket in &mut self.budget_buckets {
                bucket.percent *= scale;
            }
        }
    }
}

/// A spending category with aggregate total and transaction count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryTotal {
    /// Category name
    pub name: String,
    /// Aggregate signed total
    pub total: f64,
    /// Number of contributing transactions
    pub count: u32,
}

/// Spending analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpendingInsight {
    /// Natural-language summary of spending patterns
    pub summary: String,
    /// Largest spending categories, descending
    pub top_categories: Vec<CategoryTotal>,
    /// Transactions the model flagged as out of pattern
    pub unusual_transactions: Vec<serde_json::Value>,
}

impl SpendingInsight {
    fn validate(&self) -> AppResult<()> {
        if self.summary.trim().is_empty() {
            return Err(AppError::upstream_schema("empty summary in model output"));
        }
        for category in &self.top_categories {
            if !category.total.is_finite() {
                return Err(AppError::upstream_schema(format!(
                    "category '{}' has non-finite total",
                    category.name
                )));
            }
        }
        Ok(())
    }
}

/// A single suspected-fraud finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FraudFinding {
    /// The transaction under suspicion, echoed back by the model
    pub transaction: serde_json::Value,
    /// Risk score in `[0, 1]`
    pub risk_score: f64,
    /// Why the transaction was flagged
    pub reason: String,
    /// Suggested action for the account holder
    pub recommendation: String,
}

/// Fraud detection payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FraudInsight {
    /// Per-transaction findings
    pub findings: Vec<FraudFinding>,
    /// Overall risk classification (e.g. "low", "medium", "high")
    pub overall_risk: String,
    /// Natural-language summary
    pub summary: String,
}

impl FraudInsight {
    fn validate(&self) -> AppResult<()> {
        if self.summary.trim().is_empty() {
            return Err(AppError::upstream_schema("empty summary in model output"));
        }
        for finding in &self.findings {
            if !finding.risk_score.is_finite()
                || !(0.0..=1.0).contains(&finding.risk_score)
            {
                return Err(AppError::upstream_schema(format!(
                    "risk score {} outside [0, 1]",
                    finding.risk_score
                )));
            }
        }
        Ok(())
    }
}

/// Validated, normalized model output for any endpoint variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsightPayload {
    /// Budget coaching result
    Coach(CoachInsight),
    /// Spending analysis result
    Spending(SpendingInsight),
    /// Fraud detection result
    Fraud(FraudInsight),
}

/// Strip markdown code fences some models wrap around JSON output
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse strict JSON, mapping any failure to an `UPSTREAM_SCHEMA` error
fn parse_strict<T: for<'de> Deserialize<'de>>(text: &str) -> AppResult<T> {
    serde_json::from_str(text)
        .map_err(|e| AppError::upstream_schema(format!("model output failed strict parse: {e}")))
}
