// ABOUTME: Response cache abstraction keyed by canonical request fingerprints
// ABOUTME: Pluggable backend behind a trait so handlers can be tested with fakes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! Response caching
//!
//! Repeated identical insight requests should not repeat the model call. A
//! [`Fingerprint`], a stable hash of the compacted ledger plus the prompt
//! identity, keys normalized model responses for a wall-clock TTL. Entries
//! are never mutated in place: expired entries are replaced, not updated.
//! Duplicate concurrent misses for the same fingerprint may both reach the
//! model; in-flight de-duplication is deliberately not provided.

/// In-memory cache implementation
pub mod memory;

use crate::errors::{AppError, AppResult};
use crate::ledger::CompactedLedger;
use crate::models::InsightPayload;
use crate::prompts::PromptSpec;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Stable hash identifying a (prompt version, compacted ledger) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for a request
    ///
    /// Covers the prompt name, its content hash, and the canonical JSON of
    /// the compacted ledger, so any change to template text or payload
    /// produces a different key.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be serialized.
    pub fn compute(prompt: &PromptSpec, ledger: &CompactedLedger) -> AppResult<Self> {
        let ledger_json = ledger
            .to_canonical_json()
            .map_err(|e| AppError::internal(format!("ledger serialization: {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(prompt.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(prompt.content_hash.as_bytes());
        hasher.update(b"\0");
        hasher.update(ledger_json.as_bytes());

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Raw hex key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache sizing and maintenance options
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Bounded LRU capacity
    pub max_entries: usize,
    /// Interval between background sweeps of expired entries
    pub cleanup_interval: Duration,
    /// Enable the background cleanup task (disable in tests)
    pub enable_background_cleanup: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            cleanup_interval: Duration::from_secs(60),
            enable_background_cleanup: true,
        }
    }
}

/// Cache contract shared by handlers and test fakes
///
/// Individual `get`/`put` operations must be safe under concurrent access;
/// the lookup-then-populate sequence as a whole is not required to be atomic.
#[async_trait::async_trait]
pub trait ResponseCache: Send + Sync {
    /// Retrieve a live (non-expired) entry
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization of a stored entry fails.
    async fn get(&self, key: &Fingerprint) -> AppResult<Option<InsightPayload>>;

    /// Store a normalized model response under the fingerprint with a TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails.
    async fn put(&self, key: &Fingerprint, value: &InsightPayload, ttl: Duration) -> AppResult<()>;

    /// Remove a single entry
    ///
    /// # Errors
    ///
    /// Returns an error if invalidation fails.
    async fn invalidate(&self, key: &Fingerprint) -> AppResult<()>;

    /// Drop every entry (admin/testing)
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    async fn clear_all(&self) -> AppResult<()>;
}
