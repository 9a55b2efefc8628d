//! Fixed-window rate limiting backed by the session store.
//!
//! A counter per `(scope, identity hash)` is incremented atomically in the
//! store, and the same store step arms the key's expiry whenever the counter
//! has none. The window resets when the key expires. Bursts straddling a
//! window boundary can reach up to twice the limit.

use log::{debug, warn};
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{keys, SessionStore};

/// Counter scopes. Each scope has an independent limit and window.
pub mod scopes {
    pub const SESSION_FINGERPRINT: &str = "session-fp";
    pub const SESSION_ORIGIN: &str = "session-ip";
    pub const SUBMIT_FINGERPRINT: &str = "submit-fp";
    pub const SUBMIT_ORIGIN: &str = "submit-ip";
}

/// Threshold for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests allowed per window.
    pub limit: u64,
    pub window_ms: u64,
}

impl RateLimit {
    pub fn new(limit: u64, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn SessionStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Counts one request against `scope:identity_hash` and decides whether
    /// it fits within the current window.
    pub async fn check(
        &self,
        scope: &str,
        identity_hash: &str,
        limit: RateLimit,
    ) -> Result<RateDecision, StoreError> {
        let key = keys::rate_limit(scope, identity_hash);
        let count = self.store.incr_with_expiry(&key, limit.window_ms).await?;

        if count < 0 || count as u64 > limit.limit {
            warn!(
                "Rate limit exceeded for scope {} ({} > {})",
                scope, count, limit.limit
            );
            return Ok(RateDecision::Deny);
        }

        debug!("Rate check {} -> {}/{}", scope, count, limit.limit);
        Ok(RateDecision::Allow)
    }
}
