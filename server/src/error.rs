//! Error taxonomy for the leaderboard server.
//!
//! Each layer has its own enum. `ApiError` is what handlers return, and its
//! status mapping is part of the contract with the game client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::ErrorResponse;
use thiserror::Error;

/// Failures talking to the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connect, timeout or transport failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered with something we did not expect.
    #[error("unexpected store response: {0}")]
    Protocol(String),
    #[error("record codec failure: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_io_error()
        {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Protocol(err.to_string())
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

/// Verifier gate failures. `Display` is the reason sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("Invalid score value")]
    InvalidScore,
    #[error("{0}")]
    MalformedSummary(String),
    #[error("Score mismatch")]
    ScoreMismatch { expected: u64, reported: String },
    #[error("Run must contain frames")]
    EmptyRun,
    #[error("Session starts in the future")]
    SessionNotYetValid,
    #[error("Session expired")]
    SessionExpired,
    #[error("Reported frames exceed maximum allowed for session duration")]
    FrameBudgetExceeded { frames: u64, max_frames: u64 },
    #[error("Base score exceeds per-frame limit")]
    BaseScoreExceeded,
    #[error("Multiplier frames exceed total frames")]
    MultiplierFramesExceeded,
    #[error("Multiplier bonus exceeds per-frame limit")]
    MultiplierBonusExceeded,
    #[error("Coin collection rate exceeds threshold")]
    CoinRateExceeded,
    #[error("Power coin count inconsistent with other metrics")]
    PowerCoinsInconsistent,
    #[error("Run timestamps are invalid")]
    InvalidTimestamps,
    #[error("Run started before session issuance")]
    StartedBeforeIssue,
    #[error("Run ended after session expiry")]
    EndedAfterExpiry,
    #[error("Run end timestamp is in the future")]
    EndedInFuture,
    #[error("Run duration exceeded session allowance")]
    DurationExceeded,
    #[error("Paused time exceeds allowance")]
    PauseExceeded,
    #[error("Run duration inconsistent with reported frames")]
    FrameTimingMismatch,
    #[error("Too many idle timeouts")]
    TooManyIdleTimeouts,
    #[error("End reason inconsistent with idle timeouts")]
    EndReasonMismatch,
    #[error("Power coin pickups exceed scheduled spawns")]
    PowerCoinsExceedSpawns { collected: u64, scheduled: u32 },
    #[error("Power-up events do not match power coin count")]
    PowerUpCountMismatch,
    #[error("Power-up events are not chronological")]
    PowerUpsOutOfOrder,
    #[error("Power-up event outside run frames")]
    PowerUpOutOfRange,
    #[error("Power-up multiplier frames do not match summary")]
    MultiplierFramesMismatch,
    #[error("Power-up invincibility exceeds total frames")]
    InvincibilityExceeded,
    #[error("Multiplier power-up without multiplier frames")]
    PowerUpMissingMultiplier,
    #[error("Power-up without invincibility frames")]
    PowerUpMissingInvincibility,
    #[error("Run hash mismatch")]
    RunHashMismatch,
}

/// Request-level failures, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MalformedInput(String),
    #[error("Too many requests")]
    RateLimited { scope: &'static str },
    #[error("Session not found or expired")]
    SessionNotFound,
    #[error("Session expired")]
    SessionExpired,
    #[error("Session already used")]
    SessionConflict,
    #[error("Session context mismatch")]
    ContextMismatch,
    #[error(transparent)]
    VerificationFailed(VerifyError),
    #[error("Leaderboard storage unavailable, please try again")]
    StorageUnavailable(String),
    #[error("{context}")]
    Storage { context: &'static str, detail: String },
    #[error("Leaderboard storage not configured")]
    NotConfigured,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_)
            | ApiError::SessionNotFound
            | ApiError::SessionExpired
            | ApiError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::SessionConflict => StatusCode::CONFLICT,
            ApiError::ContextMismatch => StatusCode::FORBIDDEN,
            ApiError::StorageUnavailable(_)
            | ApiError::Storage { .. }
            | ApiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wraps a store failure, keeping connectivity problems distinguishable.
    pub fn storage(context: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => ApiError::StorageUnavailable(detail),
            other => ApiError::Storage {
                context,
                detail: other.to_string(),
            },
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::SessionExpired => ApiError::SessionExpired,
            other => ApiError::VerificationFailed(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::storage("Leaderboard storage error", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::MalformedInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RateLimited { scope: "session" }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::SessionConflict.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::ContextMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::NotConfigured.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_verify_error_reason_is_message() {
        let err: ApiError = VerifyError::ScoreMismatch {
            expected: 1400,
            reported: "1401".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Score mismatch");
    }

    #[test]
    fn test_verifier_expiry_maps_to_session_expired() {
        let err: ApiError = VerifyError::SessionExpired.into();
        assert!(matches!(err, ApiError::SessionExpired));
    }

    #[test]
    fn test_storage_errors_are_distinguished() {
        let unavailable =
            ApiError::storage("Failed to create session", StoreError::Unavailable("refused".into()));
        assert!(matches!(unavailable, ApiError::StorageUnavailable(_)));
        assert_eq!(
            unavailable.to_string(),
            "Leaderboard storage unavailable, please try again"
        );

        let generic =
            ApiError::storage("Failed to create session", StoreError::Protocol("bad".into()));
        assert_eq!(generic.to_string(), "Failed to create session");
        assert_eq!(generic.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
