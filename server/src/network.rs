//! HTTP surface of the leaderboard
//!
//! Routes:
//! - `POST /api/leaderboard/session` issues a play session
//! - `POST /api/leaderboard` submits a verified score
//! - `GET  /api/leaderboard` returns the current top list
//!
//! Bodies are parsed by hand from raw bytes so malformed JSON yields the
//! same `{"error": ...}` shape as every other failure.
//!
//! When no store is configured the state carries no service and every route
//! fails closed with 500.
//!
//! The client origin is the TCP peer address. `X-Forwarded-For` is only
//! consulted when the server is configured to sit behind a trusted proxy,
//! and then only its right-most hop, the one that proxy appended.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use shared::{IssueSessionRequest, LeaderboardResponse, SessionGrant, SubmitScoreRequest};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::leaderboard::StoreLeaderboard;
use crate::rate_limiter::RateLimiter;
use crate::service::LeaderboardService;
use crate::session_manager::SessionManager;
use crate::store::open_store;
use crate::utils::Clock;
use crate::verifier::ScoreVerifier;

/// Shared state handed to every handler
#[derive(Clone, Default)]
pub struct AppState {
    service: Option<Arc<LeaderboardService>>,
    trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(service: Arc<LeaderboardService>, trust_forwarded_for: bool) -> Self {
        Self {
            service: Some(service),
            trust_forwarded_for,
        }
    }

    /// State for a server started without a store
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Wires the service from configuration: opens the store, loads the
    /// verifier tolerances and fills the leaderboard cache.
    pub async fn from_config(
        config: &ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(url) = config.store_url.as_deref() else {
            return Ok(Self::unconfigured());
        };

        let store = open_store(url, Arc::clone(&clock), config.store_timeout())?;
        let limiter = RateLimiter::new(Arc::clone(&store));
        let sessions = SessionManager::new(
            Arc::clone(&store),
            limiter.clone(),
            config.session_policy()?,
            Arc::clone(&clock),
        );
        let verifier = ScoreVerifier::new(config.verifier_limits()?);

        let leaderboard = Arc::new(StoreLeaderboard::new(store, config.leaderboard_size));
        leaderboard.init().await?;

        let service = LeaderboardService::new(
            sessions,
            limiter,
            config.submit_limits(),
            verifier,
            leaderboard,
            clock,
            config.identity_salt.clone(),
        );
        info!(
            "Leaderboard service ready (session ttl {}ms, trust forwarded-for: {})",
            config.effective_session_ttl_ms()?,
            config.trust_forwarded_for
        );
        Ok(Self::new(Arc::new(service), config.trust_forwarded_for))
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    fn service(&self) -> Result<&LeaderboardService, ApiError> {
        self.service.as_deref().ok_or(ApiError::NotConfigured)
    }

    fn origin(&self, headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
        client_origin(
            headers,
            peer.map(|ConnectInfo(addr)| addr),
            self.trust_forwarded_for,
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/leaderboard/session", post(issue_session))
        .route("/api/leaderboard", get(get_leaderboard).post(submit_score))
        .with_state(state)
}

/// Peer IP, or with `trust_forwarded_for` the right-most non-empty
/// `X-Forwarded-For` hop, falling back to the peer.
pub fn client_origin(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> Option<String> {
    let forwarded = if trust_forwarded_for {
        headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .last()
            .map(str::to_string)
    } else {
        None
    };
    forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::MalformedInput(format!("Invalid request body: {}", err)))
}

async fn issue_session(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionGrant>, ApiError> {
    let service = state.service()?;

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        IssueSessionRequest::default()
    } else {
        parse_body(&body)?
    };

    let origin = state.origin(&headers, peer);
    debug!("Session request from {:?}", origin);
    let grant = service.issue_session(request, origin.as_deref()).await?;
    Ok(Json(grant))
}

async fn submit_score(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let service = state.service()?;
    let request: SubmitScoreRequest = parse_body(&body)?;

    let origin = state.origin(&headers, peer);
    let leaderboard = service.submit_score(request, origin.as_deref()).await?;
    Ok(Json(LeaderboardResponse {
        success: true,
        leaderboard,
    }))
}

async fn get_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let leaderboard = state.service()?.leaderboard().await;
    Ok(Json(LeaderboardResponse {
        success: true,
        leaderboard,
    }))
}
