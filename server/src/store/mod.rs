//! Session store abstraction.
//!
//! All cross-request state (session records, rate-limit counters, the
//! leaderboard) lives behind [`SessionStore`]. The server itself keeps no
//! authoritative in-process state, so every mutation that races with another
//! request goes through one of the store's atomic primitives:
//! `incr_with_expiry` for counters and `compare_and_swap` for conditional
//! writes.
//!
//! Two backends are provided:
//! - [`memory::InMemoryStore`] for single-process deployments and tests
//! - [`redis::RedisStore`] backed by a Redis-compatible server

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::utils::Clock;

/// Key-value store with per-key expiry and atomic primitives.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Unconditional write. `ttl_ms = None` keeps the value until overwritten.
    async fn set(&self, key: &str, value: &[u8], ttl_ms: Option<u64>) -> Result<(), StoreError>;

    /// Writes `value` only if the current value equals `expected`
    /// (`None` meaning "key absent"). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError>;

    /// Atomically increments an integer counter, creating it at 1. A counter
    /// that has no expiry after the increment gets `ttl_ms` in the same step.
    async fn incr_with_expiry(&self, key: &str, ttl_ms: u64) -> Result<i64, StoreError>;
}

/// Logical key layout shared by every backend.
pub mod keys {
    pub const LEADERBOARD: &str = "leaderboard:entries";

    pub fn session(session_id: &str) -> String {
        format!("leaderboard:session:{}", session_id)
    }

    pub fn rate_limit(scope: &str, identity_hash: &str) -> String {
        format!("leaderboard:ratelimit:{}:{}", scope, identity_hash)
    }
}

/// Opens the backend named by a store URL.
///
/// `memory://` selects the in-process store; `redis://[:password@]host:port`
/// selects the Redis client. Neither connects until first use.
pub fn open_store(
    url: &str,
    clock: Arc<dyn Clock>,
    timeout: Duration,
) -> Result<Arc<dyn SessionStore>, StoreError> {
    let url = url.trim();
    if url.starts_with("memory://") {
        return Ok(Arc::new(memory::InMemoryStore::new(clock)));
    }
    if url.starts_with("redis://") {
        return Ok(Arc::new(redis::RedisStore::from_url(url, timeout)?));
    }
    Err(StoreError::Protocol(format!(
        "unsupported store url scheme: {}",
        url.split("://").next().unwrap_or_default()
    )))
}
