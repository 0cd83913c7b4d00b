use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Points for leaving the starting zone during the autonomous period.
pub const LEAVE_POINTS: u32 = 2;
/// Points per game piece scored during the autonomous period.
pub const AUTO_PIECE_POINTS: u32 = 4;
/// Points per game piece scored during the teleoperated period.
pub const TELEOP_PIECE_POINTS: u32 = 2;
/// Endgame points for a robot parked in its zone.
pub const PARK_POINTS: u32 = 4;
/// Endgame points for a robot on the climb structure.
pub const CLIMB_POINTS: u32 = 12;
/// Points awarded to the opposing alliance for a regular foul.
pub const FOUL_POINTS: u32 = 5;
/// Points awarded to the opposing alliance for a technical foul.
pub const TECHNICAL_FOUL_POINTS: u32 = 12;
/// Total game pieces required for the bonus ranking point.
pub const PIECE_BONUS_THRESHOLD: u32 = 20;
/// Endgame points required for the bonus ranking point.
pub const CLIMB_BONUS_THRESHOLD: u32 = 24;

/// One side of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AllianceColor {
    /// The red alliance.
    Red,
    /// The blue alliance.
    Blue,
}

impl AllianceColor {
    /// The opposing alliance.
    pub fn opponent(self) -> Self {
        match self {
            AllianceColor::Red => AllianceColor::Blue,
            AllianceColor::Blue => AllianceColor::Red,
        }
    }
}

/// Match period a scoring adjustment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoringPhase {
    /// The autonomous period.
    Auto,
    /// The teleoperated period.
    Teleop,
}

/// End-of-match position of a single robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndgameStatus {
    /// Robot did not reach a scoring position.
    #[default]
    None,
    /// Robot parked in its alliance zone.
    Parked,
    /// Robot climbed onto the structure.
    Climbed,
}

impl EndgameStatus {
    /// Points this status is worth.
    pub fn points(self) -> u32 {
        match self {
            EndgameStatus::None => 0,
            EndgameStatus::Parked => PARK_POINTS,
            EndgameStatus::Climbed => CLIMB_POINTS,
        }
    }
}

/// Penalty card assigned to a team by the head referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    /// Warning card; repeated yellows escalate by rule.
    Yellow,
    /// Disqualification from the match.
    Red,
}

/// A rule violation charged against one alliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Foul {
    /// Team charged with the violation; 0 when charged to the alliance as a whole.
    pub team_id: u32,
    /// Rule number from the game manual.
    pub rule_number: u32,
    /// Whether the foul is technical (higher point award to the opponent).
    pub is_technical: bool,
}

impl Foul {
    /// Charge `team_id` with a violation of `rule_number`.
    pub fn new(team_id: u32, rule_number: u32, is_technical: bool) -> Self {
        Self {
            team_id,
            rule_number,
            is_technical,
        }
    }

    /// Points the opposing alliance receives for this foul.
    pub fn point_value(&self) -> u32 {
        if self.is_technical {
            TECHNICAL_FOUL_POINTS
        } else {
            FOUL_POINTS
        }
    }
}

/// Raw per-alliance scoring counters for one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Whether each robot left its starting zone during auto, indexed by station position.
    pub leave_statuses: [bool; 3],
    /// Game pieces scored during the autonomous period.
    pub auto_pieces: u32,
    /// Game pieces scored during the teleoperated period.
    pub teleop_pieces: u32,
    /// Endgame position of each robot, indexed by station position.
    pub endgame_statuses: [EndgameStatus; 3],
    /// Fouls charged against this alliance.
    pub fouls: Vec<Foul>,
    /// Whether the alliance was disqualified from a playoff match.
    pub playoff_dq: bool,
}

impl Score {
    /// Compute the point totals and ranking-point flags for this score.
    ///
    /// `opponent_fouls` are the fouls charged against the other alliance; their
    /// point value is credited to this alliance. Total on any input, including
    /// a partially entered score.
    pub fn summarize(&self, opponent_fouls: &[Foul]) -> ScoreSummary {
        let leave_points = LEAVE_POINTS * self.leave_statuses.iter().filter(|left| **left).count() as u32;
        let auto_points = leave_points + AUTO_PIECE_POINTS * self.auto_pieces;
        let endgame_points: u32 = self.endgame_statuses.iter().map(|status| status.points()).sum();
        let match_points =
            auto_points + TELEOP_PIECE_POINTS * self.teleop_pieces + endgame_points;
        let foul_points: u32 = opponent_fouls.iter().map(Foul::point_value).sum();

        let score = if self.playoff_dq {
            0
        } else {
            match_points + foul_points
        };

        ScoreSummary {
            leave_points,
            auto_points,
            endgame_points,
            match_points,
            foul_points,
            score,
            piece_bonus_ranking_point: self.auto_pieces + self.teleop_pieces
                >= PIECE_BONUS_THRESHOLD,
            climb_bonus_ranking_point: endgame_points >= CLIMB_BONUS_THRESHOLD,
        }
    }
}

/// Derived point totals for one alliance in one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Points from robots leaving their starting zones.
    pub leave_points: u32,
    /// All points earned during the autonomous period.
    pub auto_points: u32,
    /// Points from endgame robot positions.
    pub endgame_points: u32,
    /// Points earned by this alliance's own play, excluding foul awards.
    pub match_points: u32,
    /// Points awarded for fouls charged against the opponent.
    pub foul_points: u32,
    /// Final score; zero when the alliance is disqualified in the playoffs.
    pub score: u32,
    /// Whether the game-piece bonus ranking point was earned.
    pub piece_bonus_ranking_point: bool,
    /// Whether the climb bonus ranking point was earned.
    pub climb_bonus_ranking_point: bool,
}

/// Cards assigned during a match, keyed by team id.
pub type CardMap = HashMap<u32, CardType>;
