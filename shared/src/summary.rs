//! Run summary value objects and the score formula.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::COIN_SCORE;

/// Which effect a collected power coin was rolled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PowerUpType {
    Multiplier = 0,
    SlowMotion = 1,
    DoubleJump = 2,
}

impl From<PowerUpType> for u8 {
    fn from(kind: PowerUpType) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for PowerUpType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerUpType::Multiplier),
            1 => Ok(PowerUpType::SlowMotion),
            2 => Ok(PowerUpType::DoubleJump),
            other => Err(format!("Invalid power-up type {}", other)),
        }
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    #[default]
    Collision,
    Idle,
    Visibility,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Collision => "collision",
            EndReason::Idle => "idle",
            EndReason::Visibility => "visibility",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndReason {
    type Err = String;

    /// Trims and lowercases; an empty value means the default, `collision`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "collision" => Ok(EndReason::Collision),
            "idle" => Ok(EndReason::Idle),
            "visibility" => Ok(EndReason::Visibility),
            other => Err(format!("Invalid end reason {}", other)),
        }
    }
}

/// One collected power coin and the frames its effects were active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpEvent {
    #[serde(rename = "type")]
    pub kind: PowerUpType,
    pub collected_at: u64,
    pub start_frame: u64,
    pub end_frame: u64,
    pub multiplier_frames: u64,
    pub invincibility_frames: u64,
}

/// Client-reported aggregate of a single run.
///
/// Timestamps are milliseconds since the Unix epoch. Field order is part of
/// the run-hash contract, since the hash covers the JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub frames: u64,
    pub base_score: u64,
    pub multiplier_frames: u64,
    pub multiplier_bonus: u64,
    pub coins_collected: u64,
    pub power_coins_collected: u64,
    pub started_at: u64,
    pub ended_at: u64,
    pub paused_ms: u64,
    pub idle_timeouts: u64,
    pub end_reason: EndReason,
    pub power_ups: Vec<PowerUpEvent>,
}

impl RunSummary {
    /// `baseScore + multiplierBonus + coinsCollected * 100`, or `None` on
    /// overflow.
    pub fn compute_score(&self) -> Option<u64> {
        self.coins_collected
            .checked_mul(COIN_SCORE)?
            .checked_add(self.base_score)?
            .checked_add(self.multiplier_bonus)
    }

    /// Wall-clock length of the run.
    pub fn duration_ms(&self) -> u64 {
        self.ended_at.saturating_sub(self.started_at)
    }
}
