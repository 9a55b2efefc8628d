//! HTTP wire messages exchanged between the game client and the leaderboard
//! server. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/leaderboard/session`. The body itself is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSessionRequest {
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Public half of an issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub session_id: String,
    pub issued_at: u64,
    pub expires_at: u64,
    /// Seed for the power-up spawn generator.
    pub seed: u32,
}

/// Body of `POST /api/leaderboard`.
///
/// `score` and `runSummary` stay loosely typed here; the server sanitizes them
/// itself rather than trusting the client's encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreRequest {
    pub player_name: String,
    pub score: f64,
    pub session_id: String,
    #[serde(alias = "summary")]
    pub run_summary: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub player_name: String,
    pub score: u64,
    pub timestamp: u64,
    pub run_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
