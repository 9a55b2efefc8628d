//! # Leaderboard Verifier Library
//!
//! This library provides the server side of the arcade leaderboard: it issues
//! play sessions, verifies the run summaries clients submit against those
//! sessions, and records accepted scores on a ranked top list.
//!
//! ## Core Responsibilities
//!
//! ### Session Lifecycle
//! Every run starts with a one-time session. A session carries:
//! - An unguessable id and a validity window
//! - A random seed the client uses to schedule power-up spawns
//! - Optional bindings to the requesting client's fingerprint and origin
//!
//! A session authorizes at most one accepted submission.
//!
//! ### Score Verification
//! The server never sees raw input. It bounds each scoring component of a
//! reported run by what the game allows within the session's time window,
//! and replays the seeded spawn schedule to check power-up claims. The first
//! failing check rejects the run with a named reason.
//!
//! ### Abuse Limiting
//! Session issuance and score submission are each rate limited per hashed
//! fingerprint and per hashed network origin using fixed-window counters.
//!
//! ## Architecture Design
//!
//! ### Stateless Request Handling
//! Requests are handled independently and concurrently. All state shared
//! between requests lives in the store and is changed only through its atomic
//! primitives: counters are incremented with their expiry in one step, and a
//! session moves from issued to claimed to used by compare-and-swap.
//!
//! ### Pluggable Storage
//! The store is a trait with an in-process backend and a Redis backend. Store
//! failures fail the request and are never retried.
//!
//! ## Module Organization
//!
//! ### Store Module (`store`)
//! Key-value storage with expiry, atomic increment and compare-and-swap.
//!
//! ### Rate Limiter Module (`rate_limiter`)
//! Fixed-window counters keyed by scope and identity hash.
//!
//! ### Session Manager Module (`session_manager`)
//! Issues, loads, claims and consumes sessions.
//!
//! ### Verifier Module (`verifier`)
//! Summary sanitization, tolerance configuration and the verification gates.
//!
//! ### Leaderboard Module (`leaderboard`)
//! Ranked top list persisted in the store, with a cache served when the
//! store cannot be read.
//!
//! ### Service and Network Modules (`service`, `network`)
//! Submission orchestration and the HTTP routes in front of it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::{router, AppState};
//! use server::utils::SystemClock;
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         store_url: Some("memory://".to_string()),
//!         ..Default::default()
//!     };
//!     let state = AppState::from_config(&config, Arc::new(SystemClock)).await?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(
//!         listener,
//!         router(state).into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod network;
pub mod rate_limiter;
pub mod service;
pub mod session_manager;
pub mod store;
pub mod utils;
pub mod verifier;
