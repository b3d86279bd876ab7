// ABOUTME: Deterministic transaction compaction for bounded, prompt-friendly ledgers
// ABOUTME: Caps enumerated rows and folds the tail into per-counterparty aggregates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Transaction compaction
//!
//! Raw transaction lists are unbounded from the caller's perspective. Before
//! a list reaches a prompt it is reduced to a [`CompactedLedger`]: the first
//! `max_rows` transactions enumerated verbatim, everything past the cap
//! folded into per-counterparty signed totals so the model still sees volume
//! signal for long tails. Compaction is deterministic: the same input list in
//! the same order always produces the same ledger.

use crate::models::Transaction;
use serde::Serialize;
use std::collections::BTreeMap;

/// Bounded, deterministic reduction of a transaction list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactedLedger {
    /// Transactions enumerated verbatim, insertion order preserved
    pub rows: Vec<Transaction>,
    /// Signed totals per counterparty label for transactions beyond the cap
    pub overflow_totals: BTreeMap<String, f64>,
    /// Sum of all positive amounts across the full input
    pub total_inflow: f64,
    /// Sum of absolute values of all negative amounts across the full input
    pub total_outflow: f64,
    /// Number of transactions in the full input
    pub transaction_count: usize,
}

impl CompactedLedger {
    /// Compact a transaction list under a row cap
    ///
    /// An empty input yields a ledger with zero rows and zero totals; it is
    /// not an error. Zero- and negative-amount transactions are preserved in
    /// the totals.
    #[must_use]
    pub fn compact(transactions: &[Transaction], max_rows: usize) -> Self {
        let mut rows = Vec::with_capacity(transactions.len().min(max_rows));
        let mut overflow_totals = BTreeMap::new();
        let mut total_inflow = 0.0;
        let mut total_outflow = 0.0;

        for (index, txn) in transactions.iter().enumerate() {
            if txn.amount > 0.0 {
                total_inflow += txn.amount;
            } else {
                total_outflow += -txn.amount;
            }

            if index < max_rows {
                rows.push(txn.clone());
            } else {
                *overflow_totals.entry(txn.label.clone()).or_insert(0.0) += txn.amount;
            }
        }

        Self {
            rows,
            overflow_totals,
            total_inflow,
            total_outflow,
            transaction_count: transactions.len(),
        }
    }

    /// Net signed sum over the full input
    #[must_use]
    pub fn net_total(&self) -> f64 {
        self.total_inflow - self.total_outflow
    }

    /// Canonical JSON rendering used for prompt inclusion and fingerprinting
    ///
    /// `BTreeMap` ordering makes the output stable for identical inputs.
    ///
    /// # Errors
    ///
    /// Serialization of these types cannot fail in practice; the `Result` is
    /// kept so callers propagate rather than panic.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn txn(day: u32, label: &str, amount: f64) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2025, 9, day).expect("valid date"),
            label: label.to_owned(),
            amount,
        }
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let ledger = CompactedLedger::compact(&[], 50);
        assert!(ledger.rows.is_empty());
        assert!(ledger.overflow_totals.is_empty());
        assert_eq!(ledger.total_inflow, 0.0);
        assert_eq!(ledger.total_outflow, 0.0);
        assert_eq!(ledger.transaction_count, 0);
    }

    #[test]
    fn test_rows_plus_overflow_conserve_amounts() {
        let transactions = vec![
            txn(1, "Salary", 3000.0),
            txn(2, "Grocer", -120.5),
            txn(3, "Rent", -900.0),
            txn(4, "Grocer", -80.25),
            txn(5, "Cafe", -15.0),
        ];
        let ledger = CompactedLedger::compact(&transactions, 2);

        let row_sum: f64 = ledger.rows.iter().map(|t| t.amount).sum();
        let overflow_sum: f64 = ledger.overflow_totals.values().sum();
        let input_sum: f64 = transactions.iter().map(|t| t.amount).sum();
        assert!((row_sum + overflow_sum - input_sum).abs() < 1e-9);
        assert!((ledger.net_total() - input_sum).abs() < 1e-9);
    }

    #[test]
    fn test_compaction_is_deterministic() {
        let transactions = vec![
            txn(1, "Salary", 2500.0),
            txn(2, "Grocer", -60.0),
            txn(3, "Grocer", -40.0),
            txn(4, "Transit", -12.0),
        ];
        let first = CompactedLedger::compact(&transactions, 2);
        let second = CompactedLedger::compact(&transactions, 2);
        assert_eq!(first, second);
        assert_eq!(
            first.to_canonical_json().expect("serializes"),
            second.to_canonical_json().expect("serializes"),
        );
    }

    #[test]
    fn test_zero_amount_preserved() {
        let transactions = vec![txn(1, "Adjustment", 0.0), txn(2, "Refund", 25.0)];
        let ledger = CompactedLedger::compact(&transactions, 50);
        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(ledger.total_inflow, 25.0);
        assert_eq!(ledger.total_outflow, 0.0);
    }
}
