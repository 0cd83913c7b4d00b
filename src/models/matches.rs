use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::score::{AllianceColor, CardMap, Score, ScoreSummary};

/// Competition phase a match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    /// Untracked match used for field checkout; never persisted in results.
    Test,
    /// Practice match; results are recorded but do not affect rankings.
    Practice,
    /// Qualification match; results drive the rankings.
    Qualification,
    /// Playoff match; results drive the elimination bracket.
    Playoff,
}

/// Outcome state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    /// Not yet played, or awaiting a replay.
    Scheduled,
    /// Complete; the red alliance won.
    RedWon,
    /// Complete; the blue alliance won.
    BlueWon,
    /// Complete; the score was tied.
    Tied,
}

impl MatchStatus {
    /// Whether the match has a recorded outcome.
    pub fn is_complete(self) -> bool {
        self != MatchStatus::Scheduled
    }
}

/// A scheduled or played match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Store-assigned identity; 0 until persisted.
    pub id: i64,
    /// Competition phase this match belongs to.
    pub match_type: MatchType,
    /// Position of this match within its type's schedule, starting at 1.
    pub type_order: u32,
    /// Short display name, e.g. `Q12` or `SF2-1`.
    pub short_name: String,
    /// Scheduled start time.
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    /// Red alliance team in station 1; 0 when the slot is empty.
    pub red1: u32,
    /// Red alliance team in station 2; 0 when the slot is empty.
    pub red2: u32,
    /// Red alliance team in station 3; 0 when the slot is empty.
    pub red3: u32,
    /// Blue alliance team in station 1; 0 when the slot is empty.
    pub blue1: u32,
    /// Blue alliance team in station 2; 0 when the slot is empty.
    pub blue2: u32,
    /// Blue alliance team in station 3; 0 when the slot is empty.
    pub blue3: u32,
    /// Surrogate flags per slot, same order as the team slots.
    pub surrogate_statuses: [bool; 6],
    /// Outcome; transitions only from `Scheduled` to a completed value.
    pub status: MatchStatus,
    /// When the match actually started on the field.
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// Playoff round (8, 4, 2, or 1); 0 for non-playoff matches.
    pub playoff_round: u32,
    /// Playoff group within the round; 0 for non-playoff matches.
    pub playoff_group: u32,
    /// Playoff instance within the series, starting at 1; 0 for non-playoff matches.
    pub playoff_instance: u32,
    /// Alliance seeded or propagated into the red slots; 0 when not yet known.
    pub playoff_red_alliance: u32,
    /// Alliance seeded or propagated into the blue slots; 0 when not yet known.
    pub playoff_blue_alliance: u32,
}

impl Match {
    /// Create an unscheduled match shell of the given type.
    pub fn new(match_type: MatchType, type_order: u32, short_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            match_type,
            type_order,
            short_name: short_name.into(),
            scheduled_at: OffsetDateTime::UNIX_EPOCH,
            red1: 0,
            red2: 0,
            red3: 0,
            blue1: 0,
            blue2: 0,
            blue3: 0,
            surrogate_statuses: [false; 6],
            status: MatchStatus::Scheduled,
            started_at: None,
            playoff_round: 0,
            playoff_group: 0,
            playoff_instance: 0,
            playoff_red_alliance: 0,
            playoff_blue_alliance: 0,
        }
    }

    /// The empty test match used for field checkout.
    pub fn test() -> Self {
        Self::new(MatchType::Test, 0, "T")
    }

    /// Team ids in station order `R1, R2, R3, B1, B2, B3`.
    pub fn team_ids(&self) -> [u32; 6] {
        [
            self.red1, self.red2, self.red3, self.blue1, self.blue2, self.blue3,
        ]
    }

    /// Set the team for the station at `index` (station order `R1..B3`).
    pub fn set_team(&mut self, index: usize, team_id: u32) {
        match index {
            0 => self.red1 = team_id,
            1 => self.red2 = team_id,
            2 => self.red3 = team_id,
            3 => self.blue1 = team_id,
            4 => self.blue2 = team_id,
            _ => self.blue3 = team_id,
        }
    }

    /// Whether the match has a recorded outcome.
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// The alliance id that won a completed playoff match, if decided.
    pub fn winning_alliance(&self) -> Option<u32> {
        match self.status {
            MatchStatus::RedWon => Some(self.playoff_red_alliance),
            MatchStatus::BlueWon => Some(self.playoff_blue_alliance),
            MatchStatus::Scheduled | MatchStatus::Tied => None,
        }
    }
}

/// Finalized scores for one playing of a match.
///
/// Replays produce additional results for the same match with increasing play
/// numbers; the result with the highest play number is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// The match this result belongs to.
    pub match_id: i64,
    /// Store-assigned sequence number per match, starting at 1.
    pub play_number: u32,
    /// Match type at the time of scoring.
    pub match_type: MatchType,
    /// Red alliance's score counters.
    pub red_score: Score,
    /// Blue alliance's score counters.
    pub blue_score: Score,
    /// Cards assigned to red alliance teams.
    pub red_cards: CardMap,
    /// Cards assigned to blue alliance teams.
    pub blue_cards: CardMap,
}

impl MatchResult {
    /// Create an empty result shell for the given match.
    pub fn new(match_id: i64, match_type: MatchType) -> Self {
        Self {
            match_id,
            play_number: 0,
            match_type,
            red_score: Score::default(),
            blue_score: Score::default(),
            red_cards: CardMap::new(),
            blue_cards: CardMap::new(),
        }
    }

    /// Point summary for one alliance, crediting the opponent's fouls.
    pub fn summary(&self, alliance: AllianceColor) -> ScoreSummary {
        match alliance {
            AllianceColor::Red => self.red_score.summarize(&self.blue_score.fouls),
            AllianceColor::Blue => self.blue_score.summarize(&self.red_score.fouls),
        }
    }

    /// The match outcome this result implies.
    pub fn status(&self) -> MatchStatus {
        let red = self.summary(AllianceColor::Red).score;
        let blue = self.summary(AllianceColor::Blue).score;
        match red.cmp(&blue) {
            std::cmp::Ordering::Greater => MatchStatus::RedWon,
            std::cmp::Ordering::Less => MatchStatus::BlueWon,
            std::cmp::Ordering::Equal => MatchStatus::Tied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::score::Foul;

    #[test]
    fn result_status_follows_totals() {
        let mut result = MatchResult::new(5, MatchType::Qualification);
        assert_eq!(result.status(), MatchStatus::Tied);

        result.red_score.teleop_pieces = 3;
        assert_eq!(result.status(), MatchStatus::RedWon);

        result.blue_score.teleop_pieces = 5;
        assert_eq!(result.status(), MatchStatus::BlueWon);
    }

    #[test]
    fn fouls_can_swing_the_outcome() {
        let mut result = MatchResult::new(5, MatchType::Qualification);
        result.red_score.teleop_pieces = 2;
        // A technical foul on red hands blue 12 points.
        result.red_score.fouls.push(Foul {
            team_id: 0,
            rule_number: 410,
            is_technical: true,
        });
        assert_eq!(result.status(), MatchStatus::BlueWon);
    }

    #[test]
    fn winning_alliance_uses_playoff_seeds() {
        let mut m = Match::new(MatchType::Playoff, 1, "SF1-1");
        m.playoff_red_alliance = 2;
        m.playoff_blue_alliance = 3;
        assert_eq!(m.winning_alliance(), None);

        m.status = MatchStatus::BlueWon;
        assert_eq!(m.winning_alliance(), Some(3));

        m.status = MatchStatus::Tied;
        assert_eq!(m.winning_alliance(), None);
    }
}
