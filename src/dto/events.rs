//! Payloads carried by the arena's notifier topics.

use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::arena::MatchState;
use crate::ds::DsTelemetry;
use crate::models::{CardMap, Match, Score, ScoreSummary, Team};

/// Payload for the match-load topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchLoadPayload {
    /// The match now loaded on the field.
    #[serde(rename = "match")]
    pub current_match: Match,
    /// Team records by station name, in field order.
    pub teams: IndexMap<String, Option<Team>>,
    /// Whether the operator may substitute teams for this match.
    pub allow_substitution: bool,
}

/// Payload for the match-time topic.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTimePayload {
    /// Current phase of the match.
    pub match_state: MatchState,
    /// Whole seconds since the period timer started.
    pub match_time_sec: u64,
}

/// Live link report for one station, for the arena-status topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    /// Team assigned to the station.
    pub team: Option<Team>,
    /// Operator bypass flag.
    pub bypass: bool,
    /// Emergency-stop flag.
    pub estop: bool,
    /// Whether a driver station is connected for this station.
    pub ds_connected: bool,
    /// Station the driver station is actually plugged into, when mismatched.
    pub wrong_station: Option<String>,
    /// Link and power readings from the driver station.
    #[serde(flatten)]
    pub telemetry: DsTelemetry,
}

/// Payload for the arena-status topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaStatusPayload {
    /// Current phase of the match.
    pub match_state: MatchState,
    /// Reason shown for the running timeout; absent outside timeouts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_description: Option<String>,
    /// Per-station status keyed by station name, in field order.
    pub stations: IndexMap<String, StationStatus>,
}

/// One alliance's half of the realtime-score topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllianceScorePayload {
    /// Raw counters as currently entered.
    pub score: Score,
    /// Derived totals including the opponent's foul awards.
    pub summary: ScoreSummary,
    /// Referee has signed off on the autonomous score.
    pub auto_committed: bool,
    /// Referee has signed off on the final score.
    pub teleop_committed: bool,
}

/// Payload for the realtime-score topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeScorePayload {
    /// Red alliance's live score.
    pub red: AllianceScorePayload,
    /// Blue alliance's live score.
    pub blue: AllianceScorePayload,
}

/// Payload for the score-posted topic; the last officially posted result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePostedPayload {
    /// The match the result belongs to.
    #[serde(rename = "match")]
    pub current_match: Match,
    /// Red alliance's final totals.
    pub red_summary: ScoreSummary,
    /// Blue alliance's final totals.
    pub blue_summary: ScoreSummary,
    /// Cards assigned to red teams.
    pub red_cards: CardMap,
    /// Cards assigned to blue teams.
    pub blue_cards: CardMap,
}

/// Payload for the event-status topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusPayload {
    /// Event name from the settings.
    pub event_name: String,
    /// Field cycle time observed between the last two match starts.
    pub last_cycle_time_sec: Option<f64>,
}

/// Payload for the scoring-status topic.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringStatusPayload {
    /// Red referee has committed the final score.
    pub red_score_committed: bool,
    /// Blue referee has committed the final score.
    pub blue_score_committed: bool,
}

/// One registered display, for the display-configuration topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Connection-scoped display id.
    pub id: Uuid,
    /// Operator-assigned name; empty until configured.
    pub nickname: String,
}
