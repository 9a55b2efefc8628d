//! Plausibility checks for a reported run
//!
//! The verifier never replays input. It sanitizes the client's run summary,
//! then bounds every scoring component by what the game physics allow within
//! the session's time window, and reconstructs how many power coins the
//! session's seed could have spawned. Each check is a hard gate; the first
//! failure names the reason.
//!
//! Verification is pure: the same summary, session and `now` always give the
//! same outcome.

pub mod limits;
pub mod sanitize;

use serde_json::Value;
use shared::{count_spawn_opportunities, run_hash, EndReason, PowerUpType, RunSummary};

use crate::error::VerifyError;
use crate::session_manager::SessionRecord;

pub use limits::VerifierLimits;
pub use sanitize::{sanitize_number, sanitize_summary};

/// A run that passed every gate, with the values derived along the way
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedSummary {
    pub summary: RunSummary,
    pub expected_score: u64,
    pub duration_ms: u64,
    pub active_duration_ms: u64,
    /// Power coin spawns the session seed allows within the reported frames
    pub spawn_opportunities: u32,
    /// Server-side run hash over the sanitized summary
    pub run_hash: String,
}

impl VerifiedSummary {
    /// Compares a client-supplied run hash against the server's. A missing
    /// hash is accepted.
    pub fn check_run_hash(&self, claimed: Option<&str>) -> Result<(), VerifyError> {
        match claimed.map(str::trim) {
            None | Some("") => Ok(()),
            Some(hash) if hash.eq_ignore_ascii_case(&self.run_hash) => Ok(()),
            Some(_) => Err(VerifyError::RunHashMismatch),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreVerifier {
    limits: VerifierLimits,
}

impl ScoreVerifier {
    pub fn new(limits: VerifierLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &VerifierLimits {
        &self.limits
    }

    /// Runs every gate in order against a raw summary.
    pub fn verify(
        &self,
        reported_score: f64,
        raw_summary: &Value,
        session: &SessionRecord,
        now: u64,
    ) -> Result<VerifiedSummary, VerifyError> {
        if !reported_score.is_finite() || reported_score < 0.0 {
            return Err(VerifyError::InvalidScore);
        }
        let summary = sanitize_summary(raw_summary)?;

        let expected_score = self.check_score(reported_score, &summary)?;

        if summary.frames == 0 {
            return Err(VerifyError::EmptyRun);
        }

        self.check_session_window(&summary, session, now)?;
        self.check_score_caps(&summary)?;
        let (duration_ms, active_duration_ms) = self.check_timing(&summary, session, now)?;
        self.check_end_reason(&summary)?;

        let spawn_opportunities = count_spawn_opportunities(session.seed, summary.frames);
        check_spawn_budget(&summary, spawn_opportunities)?;
        check_power_ups(&summary)?;

        let run_hash = run_hash(&summary, &session.id);
        Ok(VerifiedSummary {
            summary,
            expected_score,
            duration_ms,
            active_duration_ms,
            spawn_opportunities,
            run_hash,
        })
    }

    fn check_score(&self, reported: f64, summary: &RunSummary) -> Result<u64, VerifyError> {
        let expected = summary.compute_score();
        let matches = match expected {
            Some(expected) => {
                reported.fract() == 0.0
                    && reported <= sanitize::MAX_SAFE_INTEGER
                    && reported as u64 == expected
            }
            None => false,
        };

        match expected {
            Some(expected) if matches => Ok(expected),
            _ => Err(VerifyError::ScoreMismatch {
                expected: expected.unwrap_or(u64::MAX),
                reported: reported.to_string(),
            }),
        }
    }

    /// The request must arrive inside the session window, and the frame count
    /// must fit the session time elapsed so far at the maximum frame rate.
    fn check_session_window(
        &self,
        summary: &RunSummary,
        session: &SessionRecord,
        now: u64,
    ) -> Result<(), VerifyError> {
        let grace = self.limits.session_grace_ms;
        if now.saturating_add(grace) < session.issued_at {
            return Err(VerifyError::SessionNotYetValid);
        }
        if now > session.expires_at.saturating_add(grace) {
            return Err(VerifyError::SessionExpired);
        }

        let allotted = session.expires_at.saturating_sub(session.issued_at);
        let elapsed = now
            .saturating_sub(session.issued_at)
            .min(allotted.min(self.limits.max_session_ttl_ms));
        let max_frames = self.limits.max_frames_for(elapsed);

        if summary.frames > max_frames {
            return Err(VerifyError::FrameBudgetExceeded {
                frames: summary.frames,
                max_frames,
            });
        }
        Ok(())
    }

    fn check_score_caps(&self, summary: &RunSummary) -> Result<(), VerifyError> {
        let limits = &self.limits;
        let frames = summary.frames;

        if summary.base_score > frames.saturating_mul(limits.max_base_points_per_frame) {
            return Err(VerifyError::BaseScoreExceeded);
        }
        if summary.multiplier_frames > frames {
            return Err(VerifyError::MultiplierFramesExceeded);
        }
        if summary.multiplier_bonus
            > summary
                .multiplier_frames
                .saturating_mul(limits.max_bonus_per_frame())
        {
            return Err(VerifyError::MultiplierBonusExceeded);
        }
        if summary.coins_collected > limits.max_coins_for(frames) {
            return Err(VerifyError::CoinRateExceeded);
        }
        if summary.power_coins_collected
            > summary
                .coins_collected
                .saturating_add(summary.multiplier_frames)
        {
            return Err(VerifyError::PowerCoinsInconsistent);
        }
        Ok(())
    }

    /// Returns `(duration, active duration)` in milliseconds.
    fn check_timing(
        &self,
        summary: &RunSummary,
        session: &SessionRecord,
        now: u64,
    ) -> Result<(u64, u64), VerifyError> {
        let limits = &self.limits;

        if summary.started_at >= summary.ended_at {
            return Err(VerifyError::InvalidTimestamps);
        }
        if summary.started_at.saturating_add(limits.max_start_drift_ms) < session.issued_at {
            return Err(VerifyError::StartedBeforeIssue);
        }
        if summary.ended_at > session.expires_at.saturating_add(limits.max_end_drift_ms) {
            return Err(VerifyError::EndedAfterExpiry);
        }
        if summary.ended_at > now.saturating_add(limits.max_end_drift_ms) {
            return Err(VerifyError::EndedInFuture);
        }

        let duration = summary.duration_ms();
        let allotted = session.expires_at.saturating_sub(session.issued_at);
        if duration > allotted.saturating_add(limits.max_duration_overrun_ms) {
            return Err(VerifyError::DurationExceeded);
        }
        if summary.paused_ms > duration || summary.paused_ms > limits.max_paused_ms {
            return Err(VerifyError::PauseExceeded);
        }

        // Compared in units of 1/fps ms so the frame length stays exact
        let active = duration - summary.paused_ms;
        let fps = limits.game_fps;
        let tolerance = limits
            .max_frame_drift_ms
            .saturating_add(limits.frame_drift_per_frame_ms.saturating_mul(summary.frames));
        let drift = active
            .saturating_mul(fps)
            .abs_diff(summary.frames.saturating_mul(1000));
        if drift > tolerance.saturating_mul(fps) {
            return Err(VerifyError::FrameTimingMismatch);
        }

        Ok((duration, active))
    }

    fn check_end_reason(&self, summary: &RunSummary) -> Result<(), VerifyError> {
        if summary.idle_timeouts > self.limits.max_idle_timeouts {
            return Err(VerifyError::TooManyIdleTimeouts);
        }
        if (summary.end_reason == EndReason::Idle) != (summary.idle_timeouts > 0) {
            return Err(VerifyError::EndReasonMismatch);
        }
        Ok(())
    }
}

fn check_spawn_budget(summary: &RunSummary, scheduled: u32) -> Result<(), VerifyError> {
    let events = summary.power_ups.len() as u64;
    for collected in [summary.power_coins_collected, events] {
        if collected > u64::from(scheduled) {
            return Err(VerifyError::PowerCoinsExceedSpawns {
                collected,
                scheduled,
            });
        }
    }
    Ok(())
}

/// Every power coin pickup is one event, and each event's effects must add up
/// to the summary's totals.
fn check_power_ups(summary: &RunSummary) -> Result<(), VerifyError> {
    let events = &summary.power_ups;
    if events.len() as u64 != summary.power_coins_collected {
        return Err(VerifyError::PowerUpCountMismatch);
    }

    if events
        .windows(2)
        .any(|pair| pair[1].collected_at <= pair[0].collected_at)
    {
        return Err(VerifyError::PowerUpsOutOfOrder);
    }

    let mut multiplier_frames: u64 = 0;
    let mut invincibility_frames: u64 = 0;
    for event in events {
        if event.collected_at > summary.frames
            || event.start_frame > event.end_frame
            || event.end_frame > summary.frames
        {
            return Err(VerifyError::PowerUpOutOfRange);
        }
        if event.kind == PowerUpType::Multiplier && event.multiplier_frames == 0 {
            return Err(VerifyError::PowerUpMissingMultiplier);
        }
        if event.invincibility_frames == 0 {
            return Err(VerifyError::PowerUpMissingInvincibility);
        }
        multiplier_frames = multiplier_frames.saturating_add(event.multiplier_frames);
        invincibility_frames = invincibility_frames.saturating_add(event.invincibility_frames);
    }

    if multiplier_frames != summary.multiplier_frames {
        return Err(VerifyError::MultiplierFramesMismatch);
    }
    if invincibility_frames > summary.frames {
        return Err(VerifyError::InvincibilityExceeded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::PowerUpEvent;

    const ISSUED: u64 = 1_700_000_000_000;
    const TTL: u64 = 300_000;

    fn session(seed: u32) -> SessionRecord {
        SessionRecord {
            id: "session-1".to_string(),
            issued_at: ISSUED,
            expires_at: ISSUED + TTL,
            used: false,
            used_at: None,
            claimed_at: None,
            seed,
            fingerprint_hash: None,
            ip_hash: None,
        }
    }

    fn ten_second_run() -> Value {
        json!({
            "frames": 600,
            "baseScore": 1200,
            "multiplierFrames": 0,
            "multiplierBonus": 0,
            "coinsCollected": 2,
            "powerCoinsCollected": 0,
            "startedAt": ISSUED,
            "endedAt": ISSUED + 10_000,
            "pausedMs": 0,
            "idleTimeouts": 0,
            "endReason": "collision"
        })
    }

    fn verify(score: f64, raw: &Value, now: u64) -> Result<VerifiedSummary, VerifyError> {
        ScoreVerifier::default().verify(score, raw, &session(0), now)
    }

    #[test]
    fn test_accepts_plain_run() {
        let verified = verify(1400.0, &ten_second_run(), ISSUED + 10_000).unwrap();
        assert_eq!(verified.expected_score, 1400);
        assert_eq!(verified.duration_ms, 10_000);
        assert_eq!(verified.active_duration_ms, 10_000);
        assert_eq!(verified.spawn_opportunities, 1);
        assert_eq!(verified.run_hash, run_hash(&verified.summary, "session-1"));
    }

    #[test]
    fn test_score_must_match_exactly() {
        let raw = ten_second_run();
        let now = ISSUED + 10_000;
        assert_eq!(
            verify(1401.0, &raw, now),
            Err(VerifyError::ScoreMismatch {
                expected: 1400,
                reported: "1401".to_string()
            })
        );
        assert!(matches!(
            verify(1399.0, &raw, now),
            Err(VerifyError::ScoreMismatch { .. })
        ));
        assert!(matches!(
            verify(1400.5, &raw, now),
            Err(VerifyError::ScoreMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_score_values() {
        let raw = ten_second_run();
        assert_eq!(verify(-1.0, &raw, ISSUED), Err(VerifyError::InvalidScore));
        assert_eq!(verify(f64::NAN, &raw, ISSUED), Err(VerifyError::InvalidScore));
        assert_eq!(
            verify(f64::INFINITY, &raw, ISSUED),
            Err(VerifyError::InvalidScore)
        );
    }

    #[test]
    fn test_empty_run_rejected() {
        let mut raw = ten_second_run();
        raw["frames"] = json!(0);
        raw["baseScore"] = json!(0);
        raw["coinsCollected"] = json!(0);
        assert_eq!(verify(0.0, &raw, ISSUED + 10_000), Err(VerifyError::EmptyRun));
    }

    #[test]
    fn test_session_window() {
        let raw = ten_second_run();
        assert_eq!(
            verify(1400.0, &raw, ISSUED - 2_001),
            Err(VerifyError::SessionNotYetValid)
        );
        assert_eq!(
            verify(1400.0, &raw, ISSUED + TTL + 2_001),
            Err(VerifyError::SessionExpired)
        );
        assert!(verify(1400.0, &raw, ISSUED + TTL + 2_000).is_ok());
    }

    #[test]
    fn test_frame_budget_boundary() {
        // 10 s elapsed at 70 fps allows exactly 700 frames
        let mut raw = ten_second_run();
        raw["frames"] = json!(700);
        assert!(verify(1400.0, &raw, ISSUED + 10_000).is_ok());

        raw["frames"] = json!(701);
        assert_eq!(
            verify(1400.0, &raw, ISSUED + 10_000),
            Err(VerifyError::FrameBudgetExceeded {
                frames: 701,
                max_frames: 700
            })
        );
    }

    #[test]
    fn test_frames_bounded_by_elapsed_not_ttl() {
        // Submitted one second in: 600 frames cannot have been played yet
        let raw = ten_second_run();
        assert!(matches!(
            verify(1400.0, &raw, ISSUED + 1_000),
            Err(VerifyError::FrameBudgetExceeded { max_frames: 70, .. })
        ));
    }

    #[test]
    fn test_per_frame_caps() {
        let now = ISSUED + 10_000;

        let mut raw = ten_second_run();
        raw["baseScore"] = json!(3601);
        assert_eq!(verify(3801.0, &raw, now), Err(VerifyError::BaseScoreExceeded));

        let mut raw = ten_second_run();
        raw["multiplierFrames"] = json!(601);
        assert_eq!(
            verify(1400.0, &raw, now),
            Err(VerifyError::MultiplierFramesExceeded)
        );

        let mut raw = ten_second_run();
        raw["multiplierFrames"] = json!(10);
        raw["multiplierBonus"] = json!(2941);
        assert_eq!(
            verify(4341.0, &raw, now),
            Err(VerifyError::MultiplierBonusExceeded)
        );

        let mut raw = ten_second_run();
        raw["coinsCollected"] = json!(121);
        assert_eq!(verify(13300.0, &raw, now), Err(VerifyError::CoinRateExceeded));

        let mut raw = ten_second_run();
        raw["powerCoinsCollected"] = json!(3);
        assert_eq!(
            verify(1400.0, &raw, now),
            Err(VerifyError::PowerCoinsInconsistent)
        );
    }

    #[test]
    fn test_timestamp_gates() {
        let now = ISSUED + 10_000;
        let check = |started: u64, ended: u64, now: u64| {
            let mut raw = ten_second_run();
            raw["startedAt"] = json!(started);
            raw["endedAt"] = json!(ended);
            verify(1400.0, &raw, now)
        };

        assert_eq!(check(ISSUED, ISSUED, now), Err(VerifyError::InvalidTimestamps));
        assert_eq!(
            check(ISSUED - 2_001, ISSUED + 7_999, now),
            Err(VerifyError::StartedBeforeIssue)
        );
        assert_eq!(
            check(ISSUED + 2_001, ISSUED + 12_001, now),
            Err(VerifyError::EndedInFuture)
        );
        assert!(check(ISSUED + 2_000, ISSUED + 12_000, now).is_ok());
        assert_eq!(
            check(ISSUED + TTL - 7_000, ISSUED + TTL + 3_000, ISSUED + TTL + 2_000),
            Err(VerifyError::EndedAfterExpiry)
        );
    }

    #[test]
    fn test_duration_and_pause_gates() {
        let now = ISSUED + TTL;

        let mut raw = ten_second_run();
        raw["startedAt"] = json!(ISSUED - 1_000);
        raw["endedAt"] = json!(ISSUED + TTL + 1_500);
        raw["pausedMs"] = json!(100_000);
        assert_eq!(verify(1400.0, &raw, now), Err(VerifyError::DurationExceeded));

        let mut raw = ten_second_run();
        raw["pausedMs"] = json!(10_001);
        assert_eq!(
            verify(1400.0, &raw, ISSUED + 10_000),
            Err(VerifyError::PauseExceeded)
        );

        let mut raw = ten_second_run();
        raw["endedAt"] = json!(ISSUED + 130_001);
        raw["pausedMs"] = json!(120_001);
        assert_eq!(verify(1400.0, &raw, now), Err(VerifyError::PauseExceeded));

        let mut raw = ten_second_run();
        raw["endedAt"] = json!(ISSUED + 130_000);
        raw["pausedMs"] = json!(120_000);
        assert!(verify(1400.0, &raw, now).is_ok());
    }

    #[test]
    fn test_active_duration_tolerance() {
        // 600 frames is 10 s; tolerance is 1500 + 4 * 600 = 3900 ms
        let now = ISSUED + 20_000;
        let with_end = |ended: u64| {
            let mut raw = ten_second_run();
            raw["endedAt"] = json!(ended);
            verify(1400.0, &raw, now)
        };

        assert!(with_end(ISSUED + 13_900).is_ok());
        assert_eq!(with_end(ISSUED + 13_901), Err(VerifyError::FrameTimingMismatch));
        assert!(with_end(ISSUED + 6_100).is_ok());
        assert_eq!(with_end(ISSUED + 6_099), Err(VerifyError::FrameTimingMismatch));
    }

    #[test]
    fn test_end_reason_consistency() {
        let now = ISSUED + 10_000;

        let mut raw = ten_second_run();
        raw["endReason"] = json!("idle");
        assert_eq!(verify(1400.0, &raw, now), Err(VerifyError::EndReasonMismatch));

        raw["idleTimeouts"] = json!(1);
        assert!(verify(1400.0, &raw, now).is_ok());

        raw["idleTimeouts"] = json!(4);
        assert_eq!(verify(1400.0, &raw, now), Err(VerifyError::TooManyIdleTimeouts));

        let mut raw = ten_second_run();
        raw["idleTimeouts"] = json!(1);
        raw["endReason"] = json!("visibility");
        assert_eq!(verify(1400.0, &raw, now), Err(VerifyError::EndReasonMismatch));
    }

    fn pickup(kind: u8, at: u64, end: u64) -> Value {
        json!({
            "type": kind,
            "collectedAt": at,
            "startFrame": at,
            "endFrame": end,
            "multiplierFrames": end - at,
            "invincibilityFrames": end - at
        })
    }

    #[test]
    fn test_accepts_power_up_run() {
        // Seed 0 spawns its first power coin at frame 491
        let mut raw = ten_second_run();
        raw["multiplierFrames"] = json!(100);
        raw["multiplierBonus"] = json!(4_900);
        raw["powerCoinsCollected"] = json!(1);
        raw["powerUps"] = json!([pickup(1, 500, 600)]);

        let verified = verify(6_300.0, &raw, ISSUED + 10_000).unwrap();
        assert_eq!(verified.summary.power_ups[0].kind, PowerUpType::SlowMotion);
    }

    #[test]
    fn test_power_coins_bounded_by_seed() {
        let mut raw = ten_second_run();
        raw["multiplierFrames"] = json!(200);
        raw["powerCoinsCollected"] = json!(2);
        raw["powerUps"] = json!([pickup(0, 300, 400), pickup(0, 500, 600)]);
        assert_eq!(
            verify(1400.0, &raw, ISSUED + 10_000),
            Err(VerifyError::PowerCoinsExceedSpawns {
                collected: 2,
                scheduled: 1
            })
        );

        // Seed 42 has no spawn in the first 600 frames
        let mut raw = ten_second_run();
        raw["multiplierFrames"] = json!(100);
        raw["powerCoinsCollected"] = json!(1);
        raw["powerUps"] = json!([pickup(0, 500, 600)]);
        assert!(matches!(
            ScoreVerifier::default().verify(1400.0, &raw, &session(42), ISSUED + 10_000),
            Err(VerifyError::PowerCoinsExceedSpawns { scheduled: 0, .. })
        ));
    }

    fn with_events(frames: u64, multiplier_frames: u64, events: Vec<PowerUpEvent>) -> RunSummary {
        RunSummary {
            frames,
            multiplier_frames,
            power_coins_collected: events.len() as u64,
            power_ups: events,
            ..Default::default()
        }
    }

    fn event(kind: PowerUpType, at: u64, multiplier: u64, invincibility: u64) -> PowerUpEvent {
        PowerUpEvent {
            kind,
            collected_at: at,
            start_frame: at,
            end_frame: at + multiplier.max(invincibility),
            multiplier_frames: multiplier,
            invincibility_frames: invincibility,
        }
    }

    #[test]
    fn test_power_up_details() {
        use PowerUpType::*;

        let ok = with_events(
            2_000,
            400,
            vec![
                event(Multiplier, 500, 200, 300),
                event(DoubleJump, 1_000, 200, 300),
            ],
        );
        assert!(check_power_ups(&ok).is_ok());

        let mut missing = ok.clone();
        missing.power_coins_collected = 3;
        assert_eq!(
            check_power_ups(&missing),
            Err(VerifyError::PowerUpCountMismatch)
        );

        let mut reordered = ok.clone();
        reordered.power_ups.swap(0, 1);
        assert_eq!(
            check_power_ups(&reordered),
            Err(VerifyError::PowerUpsOutOfOrder)
        );

        let mut late = ok.clone();
        late.power_ups[1].end_frame = 2_001;
        assert_eq!(check_power_ups(&late), Err(VerifyError::PowerUpOutOfRange));

        let mut inverted = ok.clone();
        inverted.power_ups[0].start_frame = 900;
        assert_eq!(
            check_power_ups(&inverted),
            Err(VerifyError::PowerUpOutOfRange)
        );

        let mismatch = with_events(2_000, 399, ok.power_ups.clone());
        assert_eq!(
            check_power_ups(&mismatch),
            Err(VerifyError::MultiplierFramesMismatch)
        );

        let no_multiplier = with_events(2_000, 0, vec![event(Multiplier, 500, 0, 300)]);
        assert_eq!(
            check_power_ups(&no_multiplier),
            Err(VerifyError::PowerUpMissingMultiplier)
        );

        let no_invincibility = with_events(2_000, 0, vec![event(SlowMotion, 500, 0, 0)]);
        assert_eq!(
            check_power_ups(&no_invincibility),
            Err(VerifyError::PowerUpMissingInvincibility)
        );

        let too_invincible = with_events(
            700,
            0,
            vec![event(SlowMotion, 10, 0, 300), event(SlowMotion, 20, 0, 401)],
        );
        assert_eq!(
            check_power_ups(&too_invincible),
            Err(VerifyError::InvincibilityExceeded)
        );
    }

    #[test]
    fn test_run_hash_check() {
        let verified = verify(1400.0, &ten_second_run(), ISSUED + 10_000).unwrap();
        assert!(verified.check_run_hash(None).is_ok());
        assert!(verified
            .check_run_hash(Some(&verified.run_hash.to_uppercase()))
            .is_ok());
        assert_eq!(
            verified.check_run_hash(Some("deadbeef")),
            Err(VerifyError::RunHashMismatch)
        );
    }

    #[test]
    fn test_custom_limits() {
        let verifier = ScoreVerifier::new(VerifierLimits {
            max_fps: 60,
            ..Default::default()
        });
        let mut raw = ten_second_run();
        raw["frames"] = json!(601);
        assert!(matches!(
            verifier.verify(1400.0, &raw, &session(0), ISSUED + 10_000),
            Err(VerifyError::FrameBudgetExceeded { max_frames: 600, .. })
        ));
    }
}
