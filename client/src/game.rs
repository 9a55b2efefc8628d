//! Client-side run recording
//!
//! The recorder follows a run frame by frame and produces the summary the
//! server verifies. Power coins spawn from the session seed with the shared
//! generator, consuming draws in the game's order: the power type when a coin
//! appears, the next delay once the coin is picked up or leaves the screen.

use shared::spawn::{draw_power_type, draw_spawn_delay, sec};
use shared::{
    run_hash, EndReason, Mulberry32, PowerUpEvent, PowerUpType, RunSummary, SessionGrant,
    SubmitScoreRequest, INVINCIBILITY_SECS, MULTIPLIER_FACTOR, MULTIPLIER_SECS,
};

/// How long an uncollected power coin stays reachable.
pub const POWER_COIN_LIFETIME_SECS: f64 = 4.0;

/// What happened to the player during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEvents {
    /// Distance points earned this frame, before any multiplier
    pub base_points: u64,
    pub coin_collected: bool,
    /// Touched the power coin, if one is on screen
    pub power_coin_touched: bool,
}

/// A power coin currently on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerCoin {
    pub kind: PowerUpType,
    pub spawned_at: u64,
}

pub struct RunRecorder {
    rng: Mulberry32,
    next_power_at: u64,
    power_coin: Option<PowerCoin>,

    frame: u64,
    invincible_for: u64,
    multiplier_for: u64,
    /// Index of the pickup whose multiplier is running
    multiplier_owner: Option<usize>,
    invincibility_owner: Option<usize>,

    summary: RunSummary,
}

impl RunRecorder {
    pub fn new(grant: &SessionGrant, started_at: u64) -> Self {
        let mut rng = Mulberry32::new(grant.seed);
        let next_power_at = draw_spawn_delay(&mut rng);
        Self {
            rng,
            next_power_at,
            power_coin: None,
            frame: 0,
            invincible_for: 0,
            multiplier_for: 0,
            multiplier_owner: None,
            invincibility_owner: None,
            summary: RunSummary {
                started_at,
                ..Default::default()
            },
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn power_coin(&self) -> Option<PowerCoin> {
        self.power_coin
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_for > 0
    }

    pub fn score(&self) -> u64 {
        self.summary.compute_score().unwrap_or(u64::MAX)
    }

    fn schedule_next_power(&mut self) {
        self.next_power_at = self.frame + draw_spawn_delay(&mut self.rng);
    }

    /// Advances the run by one frame.
    pub fn step(&mut self, events: FrameEvents) {
        self.frame += 1;
        let frame = self.frame;

        if self.power_coin.is_none() && frame >= self.next_power_at {
            let kind = PowerUpType::try_from(draw_power_type(&mut self.rng))
                .unwrap_or(PowerUpType::Multiplier);
            self.power_coin = Some(PowerCoin {
                kind,
                spawned_at: frame,
            });
        }
        if let Some(coin) = self.power_coin {
            if frame - coin.spawned_at >= sec(POWER_COIN_LIFETIME_SECS) {
                self.power_coin = None;
                self.schedule_next_power();
            }
        }

        self.invincible_for = self.invincible_for.saturating_sub(1);
        self.multiplier_for = self.multiplier_for.saturating_sub(1);

        if events.power_coin_touched {
            if let Some(coin) = self.power_coin.take() {
                self.collect_power_coin(coin);
            }
        }
        if events.coin_collected {
            self.summary.coins_collected += 1;
        }

        self.apply_frame_score(events.base_points);
    }

    fn collect_power_coin(&mut self, coin: PowerCoin) {
        let index = self.summary.power_ups.len();
        self.summary.power_ups.push(PowerUpEvent {
            kind: coin.kind,
            collected_at: self.frame,
            start_frame: self.frame,
            end_frame: self.frame,
            multiplier_frames: 0,
            invincibility_frames: 0,
        });
        self.summary.power_coins_collected += 1;

        self.invincible_for = sec(INVINCIBILITY_SECS);
        self.multiplier_for = sec(MULTIPLIER_SECS);
        self.invincibility_owner = Some(index);
        self.multiplier_owner = Some(index);
        self.schedule_next_power();
    }

    fn apply_frame_score(&mut self, base_points: u64) {
        let frame = self.frame;
        let summary = &mut self.summary;
        summary.frames = frame;
        summary.base_score += base_points;

        if self.multiplier_for > 0 {
            summary.multiplier_frames += 1;
            summary.multiplier_bonus += base_points * (MULTIPLIER_FACTOR - 1);
            if let Some(event) = self
                .multiplier_owner
                .and_then(|index| summary.power_ups.get_mut(index))
            {
                event.multiplier_frames += 1;
                event.end_frame = frame;
            }
        }

        if self.invincible_for > 0 {
            if let Some(event) = self
                .invincibility_owner
                .and_then(|index| summary.power_ups.get_mut(index))
            {
                event.invincibility_frames += 1;
                event.end_frame = frame;
            }
        }
    }

    /// Closes the run. An idle ending counts as one idle timeout.
    pub fn finish(mut self, ended_at: u64, paused_ms: u64, reason: EndReason) -> RunSummary {
        self.summary.ended_at = ended_at;
        self.summary.paused_ms = paused_ms;
        self.summary.end_reason = reason;
        if reason == EndReason::Idle {
            self.summary.idle_timeouts = self.summary.idle_timeouts.max(1);
        }
        self.summary
    }
}

/// Builds the submission body for a finished run, hashed to its session.
pub fn build_submission(
    player_name: &str,
    session_id: &str,
    summary: &RunSummary,
    fingerprint: Option<String>,
) -> Result<SubmitScoreRequest, serde_json::Error> {
    Ok(SubmitScoreRequest {
        player_name: player_name.to_string(),
        score: summary.compute_score().unwrap_or(u64::MAX) as f64,
        session_id: session_id.to_string(),
        run_summary: serde_json::to_value(summary)?,
        fingerprint,
        hash: Some(run_hash(summary, session_id)),
        timestamp: Some(shared::get_timestamp()),
    })
}
