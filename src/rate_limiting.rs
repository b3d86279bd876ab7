// ABOUTME: Proactive admission control for outbound model calls
// ABOUTME: Bounds concurrent calls and call starts per rolling minute, with bounded wait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Admission Gate
//!
//! Hosted model APIs impose their own per-key rate limits; this gate keeps
//! the service under that ceiling proactively instead of absorbing 429s
//! reactively. Two independent per-process bounds are enforced:
//!
//! - a counting gate on concurrently in-flight model calls, and
//! - a ceiling on call starts per rolling 60-second window.
//!
//! Callers wait (cooperatively) rather than failing immediately, up to a
//! bounded wait; exceeding the wait yields a `THROTTLED` classification
//! distinct from model-call failures. Lock sections are short and contain no
//! I/O; the model call itself always happens outside the gate's lock.

use crate::config::LimitsConfig;
use crate::errors::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Length of the rolling call-start window
const WINDOW: Duration = Duration::from_secs(60);

/// Proof of admission; holding it occupies one concurrency slot
///
/// The slot is released when the permit is dropped, i.e. when the model call
/// (including retries) has finished.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Per-process admission gate over outbound model calls
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    window: Arc<Mutex<VecDeque<Instant>>>,
    calls_per_minute: u32,
    max_wait: Duration,
}

impl AdmissionGate {
    /// Create a gate with the given concurrency and per-minute ceilings
    ///
    /// `calls_per_minute == 0` disables the rolling-window bound (the
    /// concurrency bound still applies).
    #[must_use]
    pub fn new(max_concurrent: usize, calls_per_minute: u32, max_wait: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            window: Arc::new(Mutex::new(VecDeque::new())),
            calls_per_minute,
            max_wait,
        }
    }

    /// Build a gate from the configured limits
    #[must_use]
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(
            limits.max_concurrent_calls,
            limits.calls_per_minute,
            limits.admission_wait(),
        )
    }

    /// Wait for admission, bounded by the configured maximum wait
    ///
    /// # Errors
    ///
    /// Returns a `THROTTLED` error if either bound cannot be satisfied
    /// within the bounded wait window.
    pub async fn admit(&self) -> AppResult<AdmissionPermit> {
        let deadline = Instant::now() + self.max_wait;

        let permit = tokio::time::timeout_at(deadline, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| {
                AppError::throttled(format!(
                    "no model-call slot available within {}s",
                    self.max_wait.as_secs()
                ))
            })?
            .map_err(|_| AppError::internal("admission semaphore closed"))?;

        if self.calls_per_minute == 0 {
            return Ok(AdmissionPermit { _permit: permit });
        }

        loop {
            let next_expiry = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|start| now.duration_since(*start) >= WINDOW)
                {
                    window.pop_front();
                }

                if (window.len() as u32) < self.calls_per_minute {
                    window.push_back(now);
                    return Ok(AdmissionPermit { _permit: permit });
                }

                // Oldest start in the window bounds when a slot frees up.
                window.front().map(|oldest| *oldest + WINDOW)
            };

            let Some(next_expiry) = next_expiry else {
                return Err(AppError::throttled("per-minute call ceiling is zero"));
            };

            if next_expiry >= deadline {
                return Err(AppError::throttled(format!(
                    "per-minute ceiling of {} call starts not clearing within {}s",
                    self.calls_per_minute,
                    self.max_wait.as_secs()
                )));
            }

            tokio::time::sleep_until(next_expiry).await;
        }
    }

    /// Currently free concurrency slots (diagnostic only)
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = AdmissionGate::new(1, 0, Duration::from_millis(100));

        let permit = gate.admit().await.expect("first admission");
        assert_eq!(gate.available_slots(), 0);
        drop(permit);
        assert_eq!(gate.available_slots(), 1);

        gate.admit().await.expect("slot reusable after drop");
    }

    #[tokio::test]
    async fn test_exhausted_concurrency_throttles_after_bounded_wait() {
        let gate = AdmissionGate::new(1, 0, Duration::from_millis(50));

        let _held = gate.admit().await.expect("first admission");
        let err = gate.admit().await.expect_err("second must throttle");
        assert_eq!(err.http_status(), 429);
    }

    #[tokio::test]
    async fn test_window_ceiling_throttles() {
        let gate = AdmissionGate::new(4, 2, Duration::from_millis(50));

        let _first = gate.admit().await.expect("first start");
        let _second = gate.admit().await.expect("second start");
        let err = gate.admit().await.expect_err("third start exceeds window");
        assert_eq!(err.http_status(), 429);
    }
}
