// ABOUTME: Integration tests for the in-memory response cache
// ABOUTME: Covers TTL expiration, invalidation, and LRU capacity bounds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

use chrono::NaiveDate;
use insight_agent::cache::memory::InMemoryCache;
use insight_agent::cache::{CacheOptions, Fingerprint, ResponseCache};
use insight_agent::ledger::CompactedLedger;
use insight_agent::models::{InsightPayload, SpendingInsight, Transaction};
use insight_agent::prompts::PromptSpec;
use std::time::Duration;

fn test_options() -> CacheOptions {
    CacheOptions {
        max_entries: 4,
        cleanup_interval: Duration::from_secs(300),
        // Disabled in tests to avoid tokio runtime conflicts
        enable_background_cleanup: false,
    }
}

fn fingerprint(amount: f64) -> Fingerprint {
    let prompt = PromptSpec::new("spending_analyze", "analyze {transactions}");
    let ledger = CompactedLedger::compact(
        &[Transaction {
            date: NaiveDate::from_ymd_opt(2025, 9, 22).expect("valid date"),
            label: "Inbound".to_owned(),
            amount,
        }],
        50,
    );
    Fingerprint::compute(&prompt, &ledger).expect("fingerprint")
}

fn payload(summary: &str) -> InsightPayload {
    InsightPayload::Spending(SpendingInsight {
        summary: summary.to_owned(),
        top_categories: Vec::new(),
        unusual_transactions: Vec::new(),
    })
}

#[tokio::test]
async fn test_get_after_put_returns_stored_value() {
    let cache = InMemoryCache::new(&test_options());
    let key = fingerprint(250.0);
    let value = payload("stored");

    cache
        .put(&key, &value, Duration::from_secs(10))
        .await
        .expect("put");

    let retrieved = cache.get(&key).await.expect("get");
    assert_eq!(retrieved, Some(value));
}

#[tokio::test]
async fn test_get_after_ttl_elapsed_returns_absent() {
    let cache = InMemoryCache::new(&test_options());
    let key = fingerprint(250.0);

    cache
        .put(&key, &payload("expires"), Duration::from_millis(50))
        .await
        .expect("put");

    assert!(cache.get(&key).await.expect("get").is_some());

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(cache.get(&key).await.expect("get").is_none());
}

#[tokio::test]
async fn test_expired_entry_is_replaced_not_updated() {
    let cache = InMemoryCache::new(&test_options());
    let key = fingerprint(250.0);

    cache
        .put(&key, &payload("first"), Duration::from_millis(30))
        .await
        .expect("put");
    tokio::time::sleep(Duration::from_millis(50)).await;

    cache
        .put(&key, &payload("second"), Duration::from_secs(10))
        .await
        .expect("put");

    let retrieved = cache.get(&key).await.expect("get");
    assert_eq!(retrieved, Some(payload("second")));
}

#[tokio::test]
async fn test_invalidate_removes_entry() {
    let cache = InMemoryCache::new(&test_options());
    let key = fingerprint(250.0);

    cache
        .put(&key, &payload("gone"), Duration::from_secs(60))
        .await
        .expect("put");
    cache.invalidate(&key).await.expect("invalidate");

    assert!(cache.get(&key).await.expect("get").is_none());
}

#[tokio::test]
async fn test_capacity_bound_evicts_least_recently_used() {
    let cache = InMemoryCache::new(&test_options());

    for i in 0..6 {
        let key = fingerprint(f64::from(i));
        cache
            .put(&key, &payload("value"), Duration::from_secs(60))
            .await
            .expect("put");
    }

    // Capacity is 4; the oldest entries were evicted.
    assert_eq!(cache.len().await, 4);
    assert!(cache.get(&fingerprint(0.0)).await.expect("get").is_none());
    assert!(cache.get(&fingerprint(5.0)).await.expect("get").is_some());
}

#[tokio::test]
async fn test_clear_all_empties_cache() {
    let cache = InMemoryCache::new(&test_options());
    cache
        .put(&fingerprint(1.0), &payload("a"), Duration::from_secs(60))
        .await
        .expect("put");

    cache.clear_all().await.expect("clear");
    assert!(cache.is_empty().await);
}
