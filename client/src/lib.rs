//! # Game Client Library
//!
//! This library provides the client half of the leaderboard contract: it
//! records a run the way the arcade game does and submits it for
//! verification. Rendering is not part of it; runs are driven by a scripted
//! bot, which makes it usable for load testing and for checking that a
//! client and server agree on the deterministic parts of a run.
//!
//! ## Architecture Overview
//!
//! ### Seeded Power-Up Schedule
//! Every run belongs to a session, and the session's seed drives the shared
//! generator that decides when power coins appear and which power they
//! grant. The server replays the same generator to bound how many power
//! coins a run can contain, so the client must consume draws in exactly the
//! game's order.
//!
//! ### Run Summary
//! Instead of an input replay, the client reports aggregates: frames played,
//! base score, multiplier frames and bonus, coins, and one event per power
//! coin pickup with the frames each of its effects was active.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Frame-by-frame run recording:
//! - Power coin spawning, despawning and pickup
//! - Invincibility and multiplier timers attributed to their pickup
//! - Building the hashed submission body
//!
//! ### Input Module (`input`)
//! Seeded scripted player producing per-frame events.
//!
//! ### Network Module (`network`)
//! JSON requests to the session, submission and leaderboard endpoints,
//! sent through `reqwest` with a per-request timeout.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::{build_submission, RunRecorder};
//! use client::input::{BotInput, BotProfile};
//! use shared::{EndReason, SessionGrant};
//!
//! let grant = SessionGrant {
//!     session_id: "example".to_string(),
//!     issued_at: 0,
//!     expires_at: 300_000,
//!     seed: 42,
//! };
//!
//! let mut recorder = RunRecorder::new(&grant, grant.issued_at);
//! BotInput::new(BotProfile::default(), 7).play(&mut recorder, 600);
//! let summary = recorder.finish(grant.issued_at + 10_000, 0, EndReason::Collision);
//!
//! let submission = build_submission("bot", &grant.session_id, &summary, None).unwrap();
//! assert_eq!(submission.run_summary["frames"], 600);
//! ```

pub mod game;
pub mod input;
pub mod network;
