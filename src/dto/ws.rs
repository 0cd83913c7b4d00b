use serde::Deserialize;
use uuid::Uuid;

use crate::arena::StationId;
use crate::models::{
    Alliance, AllianceColor, AllianceStationDisplayMode, AudienceDisplayMode, CardType,
    EndgameStatus, EventSettings, Foul, LowerThird, ScoringPhase, SponsorSlide,
};

/// Commands accepted from operator WebSocket clients.
///
/// Frames carry `{"type": <command>, "data": <fields>}`; unit commands omit
/// the data member.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OperatorCommand {
    /// Load a scheduled match onto the field.
    LoadMatch {
        /// Store id of the match.
        match_id: i64,
    },
    /// Load the free-play test match.
    LoadTestMatch,
    /// Load the next unplayed match of the current type.
    LoadNextMatch {
        /// Start the scheduled break that follows the current match.
        #[serde(default)]
        start_scheduled_break: bool,
    },
    /// Replace the teams of the loaded match.
    SubstituteTeams {
        /// Team ids in station order `R1..B3`; 0 empties a slot.
        team_ids: [u32; 6],
    },
    /// Start the loaded match.
    StartMatch,
    /// Abort the running match.
    AbortMatch,
    /// Return the field to pre-match after scores are committed.
    ResetMatch,
    /// Start a field timeout.
    StartTimeout {
        /// Reason shown on displays.
        description: String,
        /// Timeout length in seconds.
        duration_sec: u64,
    },
    /// Switch what the audience screen shows.
    SetAudienceDisplayMode {
        /// The mode to switch to.
        mode: AudienceDisplayMode,
    },
    /// Switch what the alliance station screens show.
    SetAllianceStationDisplayMode {
        /// The mode to switch to.
        mode: AllianceStationDisplayMode,
    },
    /// Set or clear a station's emergency stop.
    SetEstop {
        /// Station to change.
        station: StationId,
        /// New flag value.
        active: bool,
    },
    /// Set or clear a station's bypass.
    SetBypass {
        /// Station to change.
        station: StationId,
        /// New flag value.
        active: bool,
    },
    /// Post the final score of the match on the field.
    CommitMatchScore,
    /// Record whether a robot left its zone during auto.
    SetLeave {
        /// Alliance being scored.
        alliance: AllianceColor,
        /// Robot slot within the alliance, 0 to 2.
        slot: usize,
        /// Whether the robot left its zone.
        left: bool,
    },
    /// Add or remove scored game pieces.
    AdjustPieces {
        /// Alliance being scored.
        alliance: AllianceColor,
        /// Period the pieces were scored in.
        phase: ScoringPhase,
        /// Signed piece count change.
        delta: i32,
    },
    /// Record a robot's endgame position.
    SetEndgame {
        /// Alliance being scored.
        alliance: AllianceColor,
        /// Robot slot within the alliance, 0 to 2.
        slot: usize,
        /// New endgame status.
        status: EndgameStatus,
    },
    /// Charge a foul against an alliance.
    AddFoul {
        /// Alliance the foul is charged to.
        alliance: AllianceColor,
        /// The violation.
        foul: Foul,
    },
    /// Delete a previously recorded foul.
    RemoveFoul {
        /// Alliance the foul was charged to.
        alliance: AllianceColor,
        /// Index of the foul in recording order.
        index: usize,
    },
    /// Assign or clear a team's penalty card.
    SetCard {
        /// Alliance the team belongs to.
        alliance: AllianceColor,
        /// Team receiving the card.
        team_id: u32,
        /// The card, or `None` to clear it.
        card: Option<CardType>,
    },
    /// Referee sign-off on an alliance's autonomous score.
    CommitAuto {
        /// Alliance being committed.
        alliance: AllianceColor,
    },
    /// Referee sign-off on an alliance's final score.
    CommitTeleop {
        /// Alliance being committed.
        alliance: AllianceColor,
    },
    /// Reopen a committed score for correction.
    UncommitScore {
        /// Alliance being reopened.
        alliance: AllianceColor,
    },
    /// Revert the last scoring change.
    UndoScore {
        /// Alliance being reverted.
        alliance: AllianceColor,
    },
    /// Replace the alliance-selection results.
    UpdateAlliances {
        /// Alliances in seed order.
        alliances: Vec<Alliance>,
    },
    /// Replace the event settings.
    UpdateEventSettings {
        /// The full settings document.
        settings: EventSettings,
    },
    /// Show a lower third on the audience display.
    SetLowerThird {
        /// The lower third to show.
        lower_third: LowerThird,
    },
    /// Add or update a slide in the sponsor rotation.
    SetSponsorSlide {
        /// The slide to save.
        slide: SponsorSlide,
    },
    /// Name a connected display.
    SetDisplayNickname {
        /// Display to rename.
        id: Uuid,
        /// New name.
        nickname: String,
    },
    /// Ask every connected display to reload itself.
    ReloadDisplays,
    /// Any unrecognized command type.
    #[serde(other)]
    Unknown,
}

/// Query parameters a display presents when connecting.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayQuery {
    /// Stable id a reconnecting display presents to keep its registration.
    pub display_id: Option<Uuid>,
    /// Initial nickname for a new display.
    pub nickname: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_decode_from_the_frame_envelope() {
        let command: OperatorCommand =
            serde_json::from_str(r#"{"type":"loadMatch","data":{"matchId":12}}"#).unwrap();
        assert!(matches!(command, OperatorCommand::LoadMatch { match_id: 12 }));

        let command: OperatorCommand =
            serde_json::from_str(r#"{"type":"startMatch"}"#).unwrap();
        assert!(matches!(command, OperatorCommand::StartMatch));

        let command: OperatorCommand = serde_json::from_str(
            r#"{"type":"adjustPieces","data":{"alliance":"red","phase":"teleop","delta":-1}}"#,
        )
        .unwrap();
        assert!(matches!(
            command,
            OperatorCommand::AdjustPieces { delta: -1, .. }
        ));
    }

    #[test]
    fn unknown_command_types_map_to_unknown() {
        let command: OperatorCommand =
            serde_json::from_str(r#"{"type":"fireTheFog","data":{}}"#).unwrap();
        assert!(matches!(command, OperatorCommand::Unknown));
    }
}
