//! Request orchestration for session issuance and score submission
//!
//! A submission passes through these steps, each of which can end it:
//! 1. Input validation (player name, session id, fingerprint)
//! 2. Session load, used check and context binding
//! 3. Submission rate limits
//! 4. Score verification, including the optional run hash
//! 5. Claiming the session so no concurrent submission can proceed
//! 6. Recording the entry on the leaderboard
//! 7. Marking the session used
//!
//! A session is only marked used once its entry is recorded. While the entry
//! is being recorded the session is held claimed, so a concurrent submission
//! of the same session is answered with a conflict however long recording
//! takes. If recording fails the claim is released and the session stays
//! usable.

use log::{debug, error, info, warn};
use shared::{IssueSessionRequest, LeaderboardEntry, SessionGrant, SubmitScoreRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SubmitLimits;
use crate::error::ApiError;
use crate::leaderboard::LeaderboardGateway;
use crate::rate_limiter::{scopes, RateDecision, RateLimit, RateLimiter};
use crate::session_manager::SessionManager;
use crate::utils::{ClientContext, Clock};
use crate::verifier::ScoreVerifier;

pub const MAX_PLAYER_NAME_CHARS: usize = 32;
pub const MAX_SESSION_ID_CHARS: usize = 128;
pub const MAX_FINGERPRINT_CHARS: usize = 1024;

pub struct LeaderboardService {
    sessions: SessionManager,
    limiter: RateLimiter,
    submit_limits: SubmitLimits,
    verifier: ScoreVerifier,
    leaderboard: Arc<dyn LeaderboardGateway>,
    clock: Arc<dyn Clock>,
    identity_salt: String,
}

impl LeaderboardService {
    pub fn new(
        sessions: SessionManager,
        limiter: RateLimiter,
        submit_limits: SubmitLimits,
        verifier: ScoreVerifier,
        leaderboard: Arc<dyn LeaderboardGateway>,
        clock: Arc<dyn Clock>,
        identity_salt: String,
    ) -> Self {
        Self {
            sessions,
            limiter,
            submit_limits,
            verifier,
            leaderboard,
            clock,
            identity_salt,
        }
    }

    fn context(&self, fingerprint: Option<&str>, origin: Option<&str>) -> ClientContext {
        ClientContext::new(&self.identity_salt, fingerprint, origin)
    }

    pub async fn issue_session(
        &self,
        request: IssueSessionRequest,
        origin: Option<&str>,
    ) -> Result<SessionGrant, ApiError> {
        check_fingerprint(request.fingerprint.as_deref())?;
        let ctx = self.context(request.fingerprint.as_deref(), origin);
        self.sessions.issue(&ctx).await
    }

    /// Verifies a submission and records it, returning the updated top list.
    pub async fn submit_score(
        &self,
        request: SubmitScoreRequest,
        origin: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let player_name = request.player_name.trim();
        if player_name.is_empty() || player_name.chars().count() > MAX_PLAYER_NAME_CHARS {
            return Err(ApiError::MalformedInput("Invalid player name".to_string()));
        }
        let session_id = request.session_id.trim();
        if session_id.is_empty() || session_id.chars().count() > MAX_SESSION_ID_CHARS {
            return Err(ApiError::MalformedInput("Invalid session id".to_string()));
        }
        check_fingerprint(request.fingerprint.as_deref())?;

        let ctx = self.context(request.fingerprint.as_deref(), origin);
        let loaded = self.sessions.consume(session_id, &ctx).await?;

        self.check_submit_rate(&ctx).await?;

        let now = self.clock.now_ms();
        if let Some(sent_at) = request.timestamp {
            debug!(
                "Session {} client clock offset {}ms",
                session_id,
                sent_at as i128 - now as i128
            );
        }

        let verified = self
            .verifier
            .verify(request.score, &request.run_summary, &loaded.record, now)
            .and_then(|verified| {
                verified.check_run_hash(request.hash.as_deref())?;
                Ok(verified)
            })
            .map_err(|err| {
                warn!("Rejected submission for session {}: {}", session_id, err);
                ApiError::from(err)
            })?;

        let claimed = self.sessions.claim(&loaded).await?;

        let entry = LeaderboardEntry {
            id: Uuid::new_v4().to_string(),
            player_name: player_name.to_string(),
            score: verified.expected_score,
            timestamp: now,
            run_hash: verified.run_hash.clone(),
        };

        let leaderboard = match self.leaderboard.record(entry).await {
            Ok(entries) => entries,
            Err(err) => {
                error!("Failed to record score for session {}: {:?}", session_id, err);
                self.sessions.release_claim(&claimed).await;
                return Err(err);
            }
        };

        if let Err(err) = self.sessions.mark_used(&claimed).await {
            error!(
                "Score for session {} recorded but session not consumed: {:?}",
                session_id, err
            );
            return Err(err);
        }

        info!(
            "Accepted score {} for {} (session {}, {} frames, {} power coins)",
            verified.expected_score,
            player_name,
            session_id,
            verified.summary.frames,
            verified.summary.power_coins_collected
        );
        Ok(leaderboard)
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.leaderboard.top().await
    }

    async fn check_submit_rate(&self, ctx: &ClientContext) -> Result<(), ApiError> {
        let checks: [(&'static str, Option<&String>, RateLimit); 2] = [
            (
                scopes::SUBMIT_FINGERPRINT,
                ctx.fingerprint_hash.as_ref(),
                self.submit_limits.fingerprint,
            ),
            (
                scopes::SUBMIT_ORIGIN,
                ctx.origin_hash.as_ref(),
                self.submit_limits.origin,
            ),
        ];

        for (scope, identity, limit) in checks {
            let Some(identity) = identity else { continue };
            let decision = self
                .limiter
                .check(scope, identity, limit)
                .await
                .map_err(|err| ApiError::storage("Failed to check rate limit", err))?;
            if decision == RateDecision::Deny {
                return Err(ApiError::RateLimited { scope });
            }
        }
        Ok(())
    }
}

fn check_fingerprint(fingerprint: Option<&str>) -> Result<(), ApiError> {
    match fingerprint {
        Some(value) if value.chars().count() > MAX_FINGERPRINT_CHARS => {
            Err(ApiError::MalformedInput("Invalid fingerprint".to_string()))
        }
        _ => Ok(()),
    }
}
