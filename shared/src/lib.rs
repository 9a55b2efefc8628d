//! Contract shared by the arcade game client and the leaderboard verifier.
//!
//! Anything both sides must compute identically lives here: the seeded
//! generator, the power-up spawn schedule, the run summary and its score
//! formula, the run hash, and the HTTP messages.

pub mod hash;
pub mod protocol;
pub mod rng;
pub mod spawn;
pub mod summary;

pub use hash::run_hash;
pub use protocol::{
    ErrorResponse, IssueSessionRequest, LeaderboardEntry, LeaderboardResponse, SessionGrant,
    SubmitScoreRequest,
};
pub use rng::Mulberry32;
pub use spawn::{count_spawn_opportunities, SpawnSchedule};
pub use summary::{EndReason, PowerUpEvent, PowerUpType, RunSummary};

/// Simulation rate the game loop advances at.
pub const GAME_FPS: u64 = 60;
/// Points awarded per regular coin.
pub const COIN_SCORE: u64 = 100;
/// Score multiplier while a power-up is active.
pub const MULTIPLIER_FACTOR: u64 = 50;
/// Lower bound of the delay between power coin spawns.
pub const POWER_SPAWN_MIN_SECS: f64 = 5.0;
/// Width of the random part of the spawn delay.
pub const POWER_SPAWN_RANGE_SECS: f64 = 12.0;
pub const POWER_TYPE_COUNT: u64 = 3;
/// Invincibility granted by any power coin.
pub const INVINCIBILITY_SECS: f64 = 5.0;
/// Multiplier duration granted by any power coin.
pub const MULTIPLIER_SECS: f64 = 10.0;

/// Current time in milliseconds since the Unix epoch.
pub fn get_timestamp() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
