//! Power-up spawn schedule derived from a session seed.
//!
//! The game draws a delay before each power coin appears, and at spawn time it
//! draws once more to pick the power type. Reconstructing the schedule must
//! consume draws in exactly that order or the generator falls out of lockstep.

use crate::rng::Mulberry32;
use crate::{GAME_FPS, POWER_SPAWN_MIN_SECS, POWER_SPAWN_RANGE_SECS, POWER_TYPE_COUNT};

/// Converts simulated seconds to frames at the fixed game rate.
pub fn sec(seconds: f64) -> u64 {
    (seconds * GAME_FPS as f64).round() as u64
}

/// Draws the frame delay until the next power coin appears.
pub fn draw_spawn_delay(rng: &mut Mulberry32) -> u64 {
    sec(POWER_SPAWN_MIN_SECS) + rng.next_below(sec(POWER_SPAWN_RANGE_SECS))
}

/// Draws the power type for a coin that is spawning now.
pub fn draw_power_type(rng: &mut Mulberry32) -> u8 {
    rng.next_below(POWER_TYPE_COUNT) as u8
}

/// Earliest frames at which a power coin can appear, assuming each coin is
/// rescheduled the moment it spawns.
///
/// The real game reschedules only after a pickup or despawn, which happens
/// later, so this yields an upper bound on how many coins a run can see.
#[derive(Debug, Clone)]
pub struct SpawnSchedule {
    rng: Mulberry32,
    next_at: u64,
}

impl SpawnSchedule {
    pub fn new(seed: u32) -> Self {
        let mut rng = Mulberry32::new(seed);
        let next_at = draw_spawn_delay(&mut rng);
        Self { rng, next_at }
    }
}

impl Iterator for SpawnSchedule {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let at = self.next_at;
        draw_power_type(&mut self.rng);
        self.next_at = at.saturating_add(draw_spawn_delay(&mut self.rng));
        Some(at)
    }
}

/// Number of spawn opportunities at or before `frames`.
pub fn count_spawn_opportunities(seed: u32, frames: u64) -> u32 {
    SpawnSchedule::new(seed)
        .take_while(|&at| at <= frames)
        .count() as u32
}
