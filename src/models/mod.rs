//! Persisted domain model shared by the arena, the store, and the wire payloads.

mod alliance;
mod audience;
mod matches;
mod ranking;
mod score;
mod settings;
mod team;

pub use alliance::Alliance;
pub use audience::{AllianceStationDisplayMode, AudienceDisplayMode, LowerThird, SponsorSlide};
pub use matches::{Match, MatchResult, MatchStatus, MatchType};
pub use ranking::{Ranking, RankingFields, calculate_rankings};
pub use score::{
    AllianceColor, CardMap, CardType, EndgameStatus, Foul, Score, ScoreSummary, ScoringPhase,
};
pub use settings::{EventSettings, MatchTiming, PublishingConfig};
pub use team::Team;
