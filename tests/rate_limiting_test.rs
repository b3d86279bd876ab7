// ABOUTME: Integration tests for the outbound-call admission gate
// ABOUTME: Observes the concurrency ceiling and rolling-window throttling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

use insight_agent::errors::ErrorCode;
use insight_agent::rate_limiting::AdmissionGate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_at_most_k_callers_in_progress() {
    const GATE_SIZE: usize = 2;
    const CALLERS: usize = 8;

    let gate = AdmissionGate::new(GATE_SIZE, 0, Duration::from_secs(5));
    let in_progress = Arc::new(AtomicUsize::new(0));
    let max_in_progress = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let gate = gate.clone();
        let in_progress = in_progress.clone();
        let max_in_progress = max_in_progress.clone();

        handles.push(tokio::spawn(async move {
            let permit = gate.admit().await.expect("admitted within wait");

            let current = in_progress.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_progress.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_progress.fetch_sub(1, Ordering::SeqCst);

            drop(permit);
        }));
    }

    for handle in handles {
        handle.await.expect("task completed");
    }

    let observed = max_in_progress.load(Ordering::SeqCst);
    assert!(observed <= GATE_SIZE, "observed {observed} > {GATE_SIZE}");
    assert!(observed > 0);
}

#[tokio::test]
async fn test_bounded_wait_yields_throttled_classification() {
    let gate = AdmissionGate::new(1, 0, Duration::from_millis(40));

    let _held = gate.admit().await.expect("first admission");
    let err = gate.admit().await.expect_err("second caller must throttle");

    assert_eq!(err.code, ErrorCode::Throttled);
    assert_eq!(err.http_status(), 429);
}

#[tokio::test]
async fn test_window_ceiling_blocks_extra_starts() {
    let gate = AdmissionGate::new(8, 3, Duration::from_millis(40));

    let mut permits = Vec::new();
    for _ in 0..3 {
        permits.push(gate.admit().await.expect("start within window budget"));
    }

    // Concurrency slots remain, but the rolling window is exhausted.
    let err = gate.admit().await.expect_err("fourth start must throttle");
    assert_eq!(err.code, ErrorCode::Throttled);
}

#[tokio::test(start_paused = true)]
async fn test_window_slot_frees_after_sixty_seconds() {
    let gate = AdmissionGate::new(4, 1, Duration::from_secs(120));

    let _first = gate.admit().await.expect("first start");

    // Second start must wait for the rolling window to clear; with paused
    // time the 60-second expiry elapses instantly once the task sleeps.
    let _second = gate.admit().await.expect("second start after window clears");
}

#[tokio::test]
async fn test_releasing_concurrency_admits_waiter() {
    let gate = AdmissionGate::new(1, 0, Duration::from_secs(5));

    let permit = gate.admit().await.expect("first admission");

    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.admit().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(permit);

    waiter
        .await
        .expect("task completed")
        .expect("waiter admitted after release");
}
