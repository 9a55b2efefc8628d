//! Session issuance and single-use consumption for score submissions
//!
//! This module handles the server-side lifecycle of play sessions, including:
//! - Issuing one-time session tokens bound to a seed and a time window
//! - Rate limiting issuance per client fingerprint and network origin
//! - Loading and context-checking a session at submission time
//! - Claiming and finally consuming a session exactly once
//!
//! Session records live only in the store. A record moves from issued to
//! claimed to used, each step a conditional write against the exact bytes
//! read before it. Records otherwise expire on their own, so the manager
//! never deletes sessions explicitly.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::SessionGrant;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, StoreError};
use crate::rate_limiter::{scopes, RateDecision, RateLimit, RateLimiter};
use crate::store::{keys, SessionStore};
use crate::utils::{ClientContext, Clock};

/// Stored state of one play session
///
/// `used` only ever moves from false to true, and at most one submission
/// flips it. `claimed_at` is set while a submission records its score; a
/// claimed session cannot be consumed by anyone else until it is released.
/// The hashes, when present, bind the session to the client that requested
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub used: bool,
    pub used_at: Option<u64>,
    pub claimed_at: Option<u64>,
    /// Seed for the power-up spawn generator
    pub seed: u32,
    pub fingerprint_hash: Option<String>,
    pub ip_hash: Option<String>,
}

impl SessionRecord {
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn grant(&self) -> SessionGrant {
        SessionGrant {
            session_id: self.id.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            seed: self.seed,
        }
    }
}

/// A session read back from the store together with the exact bytes it was
/// stored as, so the final write can be conditional on nothing having
/// changed in between.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub record: SessionRecord,
    encoded: Vec<u8>,
}

/// Lifetimes and thresholds governing sessions
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Lifetime of a freshly issued session, already clamped
    pub ttl_ms: u64,
    /// Bind sessions to the origin that requested them
    pub bind_origin: bool,
    pub fingerprint_limit: RateLimit,
    pub origin_limit: RateLimit,
    /// How long a consumed record is kept for audit and replay detection
    pub used_residual_ttl_ms: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            bind_origin: true,
            fingerprint_limit: RateLimit::new(10, 60_000),
            origin_limit: RateLimit::new(30, 60_000),
            used_residual_ttl_ms: 60_000,
        }
    }
}

/// Issues, loads and consumes play sessions
///
/// The SessionManager holds no mutable state of its own. Everything it
/// reads or writes goes through the store, so any number of requests may use
/// one manager concurrently.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    limiter: RateLimiter,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        limiter: RateLimiter,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            limiter,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Issues a new session for the calling client
    ///
    /// Both issuance counters are charged first; either one exceeding its
    /// threshold rejects with `RateLimited`. A fresh random seed and an
    /// unguessable id are generated, and the record is stored with an expiry
    /// equal to the session lifetime.
    pub async fn issue(&self, ctx: &ClientContext) -> Result<SessionGrant, ApiError> {
        let charge = |err| ApiError::storage("Failed to create session", err);

        if let Some(fingerprint) = &ctx.fingerprint_hash {
            let decision = self
                .limiter
                .check(
                    scopes::SESSION_FINGERPRINT,
                    fingerprint,
                    self.policy.fingerprint_limit,
                )
                .await
                .map_err(charge)?;
            if decision == RateDecision::Deny {
                return Err(ApiError::RateLimited {
                    scope: scopes::SESSION_FINGERPRINT,
                });
            }
        }

        if let Some(origin) = &ctx.origin_hash {
            let decision = self
                .limiter
                .check(scopes::SESSION_ORIGIN, origin, self.policy.origin_limit)
                .await
                .map_err(charge)?;
            if decision == RateDecision::Deny {
                return Err(ApiError::RateLimited {
                    scope: scopes::SESSION_ORIGIN,
                });
            }
        }

        let issued_at = self.clock.now_ms();
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            issued_at,
            expires_at: issued_at + self.policy.ttl_ms,
            used: false,
            used_at: None,
            claimed_at: None,
            seed: rand::random::<u32>(),
            fingerprint_hash: ctx.fingerprint_hash.clone(),
            ip_hash: if self.policy.bind_origin {
                ctx.origin_hash.clone()
            } else {
                None
            },
        };

        let encoded = record.encode().map_err(charge)?;
        self.store
            .set(&keys::session(&record.id), &encoded, Some(self.policy.ttl_ms))
            .await
            .map_err(charge)?;

        info!(
            "Issued session {} (ttl {}ms, fingerprint bound: {}, origin bound: {})",
            record.id,
            self.policy.ttl_ms,
            record.fingerprint_hash.is_some(),
            record.ip_hash.is_some()
        );
        Ok(record.grant())
    }

    /// Loads a session for submission and checks it may still be used
    ///
    /// Fails with `SessionNotFound` if the record is absent or expired,
    /// `SessionConflict` if it was already consumed or is claimed by another
    /// submission, and `ContextMismatch`
    /// if it was bound to a fingerprint or origin the caller does not match.
    /// Does not mark the session used.
    pub async fn consume(
        &self,
        session_id: &str,
        ctx: &ClientContext,
    ) -> Result<LoadedSession, ApiError> {
        let encoded = self
            .store
            .get(&keys::session(session_id))
            .await
            .map_err(|err| ApiError::storage("Failed to load session", err))?
            .ok_or(ApiError::SessionNotFound)?;

        let record = SessionRecord::decode(&encoded)
            .map_err(|err| ApiError::storage("Invalid session record", err))?;

        if record.used {
            warn!("Session {} reused", session_id);
            return Err(ApiError::SessionConflict);
        }
        if record.claimed_at.is_some() {
            warn!("Session {} is already being submitted", session_id);
            return Err(ApiError::SessionConflict);
        }

        if let Some(bound) = &record.fingerprint_hash {
            if ctx.fingerprint_hash.as_ref() != Some(bound) {
                warn!("Session {} fingerprint mismatch", session_id);
                return Err(ApiError::ContextMismatch);
            }
        }

        if let Some(bound) = &record.ip_hash {
            if ctx.origin_hash.as_ref() != Some(bound) {
                warn!("Session {} origin mismatch", session_id);
                return Err(ApiError::ContextMismatch);
            }
        }

        Ok(LoadedSession { record, encoded })
    }

    /// Claims a loaded session for one submission
    ///
    /// The record is rewritten as claimed, conditional on it still being
    /// exactly what `consume` read. Of several submissions holding the same
    /// load only one gets the claim; the rest fail with `SessionConflict`.
    /// The claim lives in the record itself, so it holds for as long as the
    /// session does, however slow the holder is.
    pub async fn claim(&self, loaded: &LoadedSession) -> Result<LoadedSession, ApiError> {
        let now = self.clock.now_ms();
        let mut record = loaded.record.clone();
        record.claimed_at = Some(now);

        let encoded = record
            .encode()
            .map_err(|err| ApiError::storage("Failed to claim session", err))?;
        let ttl = record
            .expires_at
            .saturating_sub(now)
            .max(self.policy.used_residual_ttl_ms);
        let swapped = self
            .store
            .compare_and_swap(
                &keys::session(&record.id),
                Some(loaded.encoded.as_slice()),
                &encoded,
                Some(ttl),
            )
            .await
            .map_err(|err| ApiError::storage("Failed to claim session", err))?;

        if !swapped {
            warn!("Session {} already claimed by another submission", record.id);
            return Err(ApiError::SessionConflict);
        }
        debug!("Claimed session {}", record.id);
        Ok(LoadedSession { record, encoded })
    }

    /// Returns a claimed session to usable after a failed submission
    ///
    /// Best effort: failures are logged and otherwise ignored. A claim that
    /// is never released leaves the session unusable until it expires.
    pub async fn release_claim(&self, claimed: &LoadedSession) {
        let now = self.clock.now_ms();
        let mut record = claimed.record.clone();
        record.claimed_at = None;

        let remaining = record.expires_at.saturating_sub(now);
        if remaining == 0 {
            debug!("Session {} expired while claimed", record.id);
            return;
        }

        let released = match record.encode() {
            Ok(encoded) => {
                self.store
                    .compare_and_swap(
                        &keys::session(&record.id),
                        Some(claimed.encoded.as_slice()),
                        &encoded,
                        Some(remaining),
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        match released {
            Ok(true) => debug!("Released claim on session {}", record.id),
            Ok(false) => warn!("Claim on session {} changed before release", record.id),
            Err(err) => warn!("Failed to release claim on session {}: {}", record.id, err),
        }
    }

    /// Marks a claimed session used
    ///
    /// The write only succeeds if the stored record is still byte-for-byte
    /// what the caller read, so two submissions can never both consume the
    /// same session. The consumed record is kept briefly so a replay is
    /// answered with `SessionConflict` rather than `SessionNotFound`.
    pub async fn mark_used(&self, loaded: &LoadedSession) -> Result<SessionRecord, ApiError> {
        let mut record = loaded.record.clone();
        record.used = true;
        record.used_at = Some(self.clock.now_ms());

        let encoded = record
            .encode()
            .map_err(|err| ApiError::storage("Failed to update session", err))?;
        let swapped = self
            .store
            .compare_and_swap(
                &keys::session(&record.id),
                Some(loaded.encoded.as_slice()),
                &encoded,
                Some(self.policy.used_residual_ttl_ms),
            )
            .await
            .map_err(|err| ApiError::storage("Failed to update session", err))?;

        if !swapped {
            warn!("Session {} changed before it could be consumed", record.id);
            return Err(ApiError::SessionConflict);
        }

        info!("Session {} consumed", record.id);
        Ok(record)
    }
}
