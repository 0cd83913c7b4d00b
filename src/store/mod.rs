//! Persistence contract consumed by the arena, plus the shipped in-memory backend.

mod memory;

pub use memory::MemoryStore;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::{
    Alliance, EventSettings, LowerThird, Match, MatchResult, MatchType, Ranking, SponsorSlide,
    Team,
};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the persistence layer for event data.
///
/// Writes are serialized per entity by the backend; reads may run concurrently.
pub trait Store: Send + Sync {
    fn team(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Team>>>;
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<Team>>>;
    fn upsert_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>>;

    fn match_by_id(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<Match>>>;
    /// List all matches of one type, ordered by their position within the type.
    fn list_matches(&self, match_type: MatchType) -> BoxFuture<'static, StorageResult<Vec<Match>>>;
    /// Persist a new match, assigning its id.
    fn create_match(&self, m: Match) -> BoxFuture<'static, StorageResult<Match>>;
    fn update_match(&self, m: Match) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_match(&self, id: i64) -> BoxFuture<'static, StorageResult<()>>;

    /// Persist a result for one playing of a match, assigning the next play number.
    fn create_match_result(
        &self,
        result: MatchResult,
    ) -> BoxFuture<'static, StorageResult<MatchResult>>;
    /// The authoritative (highest play number) result for a match.
    fn latest_match_result(
        &self,
        match_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<MatchResult>>>;
    fn list_match_results(
        &self,
        match_id: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchResult>>>;

    fn list_rankings(&self) -> BoxFuture<'static, StorageResult<Vec<Ranking>>>;
    fn replace_rankings(&self, rankings: Vec<Ranking>) -> BoxFuture<'static, StorageResult<()>>;

    fn list_alliances(&self) -> BoxFuture<'static, StorageResult<Vec<Alliance>>>;
    fn replace_alliances(&self, alliances: Vec<Alliance>)
    -> BoxFuture<'static, StorageResult<()>>;

    fn event_settings(&self) -> BoxFuture<'static, StorageResult<Option<EventSettings>>>;
    fn save_event_settings(
        &self,
        settings: EventSettings,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn lower_third(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<LowerThird>>>;
    fn list_lower_thirds(&self) -> BoxFuture<'static, StorageResult<Vec<LowerThird>>>;
    /// Persist an overlay line pair, assigning an id when it has none.
    fn upsert_lower_third(
        &self,
        lower_third: LowerThird,
    ) -> BoxFuture<'static, StorageResult<LowerThird>>;

    fn list_sponsor_slides(&self) -> BoxFuture<'static, StorageResult<Vec<SponsorSlide>>>;
    /// Persist a sponsor slide, assigning an id when it has none.
    fn upsert_sponsor_slide(
        &self,
        slide: SponsorSlide,
    ) -> BoxFuture<'static, StorageResult<SponsorSlide>>;
}
