use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::matches::{Match, MatchResult, MatchStatus};
use crate::models::score::{AllianceColor, CardType};

/// Accumulated ranking statistics for one team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingFields {
    /// Ranking points: 2 per win, 1 per tie, plus earned bonus ranking points.
    pub ranking_points: u32,
    /// First tiebreaker: cumulative match points, excluding foul awards.
    pub match_points: u32,
    /// Second tiebreaker: cumulative autonomous points.
    pub auto_points: u32,
    /// Third tiebreaker: cumulative endgame points.
    pub endgame_points: u32,
    /// Qualification matches won.
    pub wins: u32,
    /// Qualification matches lost.
    pub losses: u32,
    /// Qualification matches tied.
    pub ties: u32,
    /// Matches in which the team was disqualified by red card.
    pub disqualifications: u32,
    /// Counted qualification matches played.
    pub played: u32,
}

/// A team's position in the qualification standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    /// The ranked team.
    pub team_id: u32,
    /// Position in the standings, starting at 1.
    pub rank: u32,
    /// The statistics the rank is derived from.
    #[serde(flatten)]
    pub fields: RankingFields,
}

/// Regenerate the full standings from completed qualification matches.
///
/// `latest_results` maps match id to the authoritative (highest play number)
/// result. Surrogate appearances are skipped entirely; a red card counts the
/// match as played and disqualified with no points earned.
pub fn calculate_rankings(
    matches: &[Match],
    latest_results: &HashMap<i64, MatchResult>,
) -> Vec<Ranking> {
    let mut fields_by_team: HashMap<u32, RankingFields> = HashMap::new();

    for m in matches {
        if !m.is_complete() {
            continue;
        }
        let Some(result) = latest_results.get(&m.id) else {
            continue;
        };
        for alliance in [AllianceColor::Red, AllianceColor::Blue] {
            let summary = result.summary(alliance);
            let (slot_base, cards) = match alliance {
                AllianceColor::Red => (0, &result.red_cards),
                AllianceColor::Blue => (3, &result.blue_cards),
            };
            let outcome = match (result.status(), alliance) {
                (MatchStatus::RedWon, AllianceColor::Red)
                | (MatchStatus::BlueWon, AllianceColor::Blue) => Outcome::Win,
                (MatchStatus::Tied, _) => Outcome::Tie,
                _ => Outcome::Loss,
            };
            let team_ids = m.team_ids();
            for offset in 0..3 {
                let slot = slot_base + offset;
                let team_id = team_ids[slot];
                if team_id == 0 || m.surrogate_statuses[slot] {
                    continue;
                }
                let fields = fields_by_team.entry(team_id).or_default();
                fields.played += 1;
                if cards.get(&team_id) == Some(&CardType::Red) {
                    fields.disqualifications += 1;
                    fields.losses += 1;
                    continue;
                }
                match outcome {
                    Outcome::Win => {
                        fields.wins += 1;
                        fields.ranking_points += 2;
                    }
                    Outcome::Tie => {
                        fields.ties += 1;
                        fields.ranking_points += 1;
                    }
                    Outcome::Loss => fields.losses += 1,
                }
                if summary.piece_bonus_ranking_point {
                    fields.ranking_points += 1;
                }
                if summary.climb_bonus_ranking_point {
                    fields.ranking_points += 1;
                }
                fields.match_points += summary.match_points;
                fields.auto_points += summary.auto_points;
                fields.endgame_points += summary.endgame_points;
            }
        }
    }

    let mut rankings: Vec<Ranking> = fields_by_team
        .into_iter()
        .map(|(team_id, fields)| Ranking {
            team_id,
            rank: 0,
            fields,
        })
        .collect();
    // Ordering is fully deterministic; the team id breaks any remaining tie.
    rankings.sort_by_key(|r| {
        (
            Reverse(r.fields.ranking_points),
            Reverse(r.fields.match_points),
            Reverse(r.fields.auto_points),
            Reverse(r.fields.endgame_points),
            r.team_id,
        )
    });
    for (index, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = index as u32 + 1;
    }
    rankings
}

enum Outcome {
    Win,
    Loss,
    Tie,
}
