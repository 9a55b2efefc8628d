//! Turns an untrusted JSON run summary into a typed [`RunSummary`].
//!
//! Numbers may arrive as JSON numbers or numeric strings. Each must be finite
//! and non-negative; fractional values are floored. Sanitizing the JSON
//! encoding of an already sanitized summary yields the same summary.

use serde_json::{Map, Value};
use shared::{EndReason, PowerUpEvent, PowerUpType, RunSummary};

use crate::error::VerifyError;

/// Largest integer a JSON client can represent exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
pub const MAX_POWER_UP_EVENTS: usize = 1024;

const REQUIRED_FIELDS: [&str; 8] = [
    "frames",
    "baseScore",
    "multiplierFrames",
    "multiplierBonus",
    "coinsCollected",
    "powerCoinsCollected",
    "startedAt",
    "endedAt",
];

const EVENT_FIELDS: [&str; 6] = [
    "type",
    "collectedAt",
    "startFrame",
    "endFrame",
    "multiplierFrames",
    "invincibilityFrames",
];

fn malformed(message: String) -> VerifyError {
    VerifyError::MalformedSummary(message)
}

/// Parses one numeric field to a non-negative integer.
pub fn sanitize_number(value: &Value, label: &str) -> Result<u64, VerifyError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    let number = parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| malformed(format!("Invalid {}", label)))?;
    if number < 0.0 {
        return Err(malformed(format!("Summary field {} must be >= 0", label)));
    }

    let floored = number.floor();
    if floored > MAX_SAFE_INTEGER {
        return Err(malformed(format!("Summary field {} is out of range", label)));
    }
    Ok(floored as u64)
}

fn required(object: &Map<String, Value>, field: &str) -> Result<u64, VerifyError> {
    match object.get(field) {
        Some(value) => sanitize_number(value, field),
        None => Err(malformed(format!("Missing summary field {}", field))),
    }
}

fn optional(object: &Map<String, Value>, field: &str) -> Result<u64, VerifyError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => sanitize_number(value, field),
    }
}

fn end_reason(object: &Map<String, Value>) -> Result<EndReason, VerifyError> {
    match object.get("endReason") {
        None | Some(Value::Null) => Ok(EndReason::default()),
        Some(Value::String(raw)) => raw.parse().map_err(malformed),
        Some(_) => Err(malformed("Invalid endReason".to_string())),
    }
}

fn power_up(value: &Value, index: usize) -> Result<PowerUpEvent, VerifyError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(format!("Invalid power-up event {}", index)))?;

    let mut fields = [0u64; EVENT_FIELDS.len()];
    for (slot, field) in fields.iter_mut().zip(EVENT_FIELDS) {
        *slot = match object.get(field) {
            Some(value) => sanitize_number(value, field)?,
            None => {
                return Err(malformed(format!(
                    "Missing power-up field {} in event {}",
                    field, index
                )))
            }
        };
    }

    let kind = u8::try_from(fields[0])
        .ok()
        .and_then(|raw| PowerUpType::try_from(raw).ok())
        .ok_or_else(|| malformed(format!("Invalid power-up type in event {}", index)))?;

    Ok(PowerUpEvent {
        kind,
        collected_at: fields[1],
        start_frame: fields[2],
        end_frame: fields[3],
        multiplier_frames: fields[4],
        invincibility_frames: fields[5],
    })
}

fn power_ups(object: &Map<String, Value>) -> Result<Vec<PowerUpEvent>, VerifyError> {
    let items = match object.get("powerUps") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(malformed("Invalid powerUps".to_string())),
    };

    if items.len() > MAX_POWER_UP_EVENTS {
        return Err(malformed("Too many power-up events".to_string()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| power_up(item, index))
        .collect()
}

/// Sanitizes a raw summary object.
pub fn sanitize_summary(raw: &Value) -> Result<RunSummary, VerifyError> {
    let object = raw
        .as_object()
        .ok_or_else(|| malformed("Missing run summary".to_string()))?;

    let mut values = [0u64; REQUIRED_FIELDS.len()];
    for (slot, field) in values.iter_mut().zip(REQUIRED_FIELDS) {
        *slot = required(object, field)?;
    }

    Ok(RunSummary {
        frames: values[0],
        base_score: values[1],
        multiplier_frames: values[2],
        multiplier_bonus: values[3],
        coins_collected: values[4],
        power_coins_collected: values[5],
        started_at: values[6],
        ended_at: values[7],
        paused_ms: optional(object, "pausedMs")?,
        idle_timeouts: optional(object, "idleTimeouts")?,
        end_reason: end_reason(object)?,
        power_ups: power_ups(object)?,
    })
}
