use serde::{Deserialize, Serialize};
use std::path::Path;

use shared::{GAME_FPS, MULTIPLIER_FACTOR};

/// Tolerances the verifier checks a run against.
///
/// Tuned to the paired game's physics and scoring curve. Operators can
/// override any subset from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifierLimits {
    /// Simulation rate the client advances frames at.
    pub game_fps: u64,
    /// Highest frame rate a genuine client can sustain.
    pub max_fps: u64,
    pub max_base_points_per_frame: u64,
    pub multiplier_factor: u64,
    pub max_coins_per_frame_ratio: f64,
    /// Clock skew accepted around the session window.
    pub session_grace_ms: u64,
    pub max_start_drift_ms: u64,
    pub max_end_drift_ms: u64,
    pub max_duration_overrun_ms: u64,
    /// Fixed part of the active-duration tolerance.
    pub max_frame_drift_ms: u64,
    /// Tolerance added per reported frame.
    pub frame_drift_per_frame_ms: u64,
    pub max_paused_ms: u64,
    pub max_idle_timeouts: u64,
    pub max_session_ttl_ms: u64,
}

impl Default for VerifierLimits {
    fn default() -> Self {
        Self {
            game_fps: GAME_FPS,
            max_fps: 70,
            max_base_points_per_frame: 6,
            multiplier_factor: MULTIPLIER_FACTOR,
            max_coins_per_frame_ratio: 0.2,
            session_grace_ms: 2_000,
            max_start_drift_ms: 2_000,
            max_end_drift_ms: 2_000,
            max_duration_overrun_ms: 2_000,
            max_frame_drift_ms: 1_500,
            frame_drift_per_frame_ms: 4,
            max_paused_ms: 120_000,
            max_idle_timeouts: 3,
            max_session_ttl_ms: 30 * 60 * 1000,
        }
    }
}

impl VerifierLimits {
    /// Loads limits from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let limits: Self = serde_json::from_str(&text)?;
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.game_fps == 0 || self.max_fps == 0 {
            return Err("frame rates must be positive".to_string());
        }
        if self.multiplier_factor == 0 {
            return Err("multiplier factor must be at least 1".to_string());
        }
        if !self.max_coins_per_frame_ratio.is_finite() || self.max_coins_per_frame_ratio < 0.0 {
            return Err("coin ratio must be a non-negative number".to_string());
        }
        Ok(())
    }

    /// Largest bonus one multiplied frame can add on top of its base points.
    pub fn max_bonus_per_frame(&self) -> u64 {
        self.max_base_points_per_frame
            .saturating_mul(self.multiplier_factor.saturating_sub(1))
    }

    /// `ceil(elapsed_seconds * max_fps)` in exact integer arithmetic.
    pub fn max_frames_for(&self, elapsed_ms: u64) -> u64 {
        elapsed_ms
            .saturating_mul(self.max_fps)
            .saturating_add(999)
            / 1000
    }

    pub fn max_coins_for(&self, frames: u64) -> u64 {
        (frames as f64 * self.max_coins_per_frame_ratio).ceil() as u64
    }
}
