use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::models::{
    Alliance, EventSettings, LowerThird, Match, MatchResult, MatchType, Ranking, SponsorSlide,
    Team,
};
use crate::store::{StorageError, StorageResult, Store};

/// In-memory [`Store`] backend.
///
/// The shipped default for single-arena events, and the fixture backend for
/// tests. All tables live under one mutex; operations are short and never
/// await while holding it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    teams: BTreeMap<u32, Team>,
    matches: BTreeMap<i64, Match>,
    next_match_id: i64,
    results: BTreeMap<i64, Vec<MatchResult>>,
    rankings: Vec<Ranking>,
    alliances: Vec<Alliance>,
    settings: Option<EventSettings>,
    lower_thirds: BTreeMap<i64, LowerThird>,
    next_lower_third_id: i64,
    sponsor_slides: BTreeMap<i64, SponsorSlide>,
    next_sponsor_slide_id: i64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked writer cannot leave a table half-updated that matters
        // more than continuing to serve the field, so poisoning is ignored.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn team(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Team>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().teams.get(&id).cloned()) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<Team>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().teams.values().cloned().collect()) })
    }

    fn upsert_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().teams.insert(team.id, team);
            Ok(())
        })
    }

    fn match_by_id(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<Match>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().matches.get(&id).cloned()) })
    }

    fn list_matches(&self, match_type: MatchType) -> BoxFuture<'static, StorageResult<Vec<Match>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.lock();
            let mut matches: Vec<Match> = inner
                .matches
                .values()
                .filter(|m| m.match_type == match_type)
                .cloned()
                .collect();
            matches.sort_by_key(|m| (m.type_order, m.id));
            Ok(matches)
        })
    }

    fn create_match(&self, mut m: Match) -> BoxFuture<'static, StorageResult<Match>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            inner.next_match_id += 1;
            m.id = inner.next_match_id;
            inner.matches.insert(m.id, m.clone());
            Ok(m)
        })
    }

    fn update_match(&self, m: Match) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if !inner.matches.contains_key(&m.id) {
                return Err(StorageError::NotFound(format!("match {}", m.id)));
            }
            inner.matches.insert(m.id, m);
            Ok(())
        })
    }

    fn delete_match(&self, id: i64) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            inner.matches.remove(&id);
            inner.results.remove(&id);
            Ok(())
        })
    }

    fn create_match_result(
        &self,
        mut result: MatchResult,
    ) -> BoxFuture<'static, StorageResult<MatchResult>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let plays = inner.results.entry(result.match_id).or_default();
            result.play_number = plays.last().map_or(1, |last| last.play_number + 1);
            plays.push(result.clone());
            Ok(result)
        })
    }

    fn latest_match_result(
        &self,
        match_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<MatchResult>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .results
                .get(&match_id)
                .and_then(|plays| plays.last().cloned()))
        })
    }

    fn list_match_results(
        &self,
        match_id: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchResult>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .results
                .get(&match_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn list_rankings(&self) -> BoxFuture<'static, StorageResult<Vec<Ranking>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().rankings.clone()) })
    }

    fn replace_rankings(&self, rankings: Vec<Ranking>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().rankings = rankings;
            Ok(())
        })
    }

    fn list_alliances(&self) -> BoxFuture<'static, StorageResult<Vec<Alliance>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().alliances.clone()) })
    }

    fn replace_alliances(
        &self,
        alliances: Vec<Alliance>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().alliances = alliances;
            Ok(())
        })
    }

    fn event_settings(&self) -> BoxFuture<'static, StorageResult<Option<EventSettings>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().settings.clone()) })
    }

    fn save_event_settings(
        &self,
        settings: EventSettings,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().settings = Some(settings);
            Ok(())
        })
    }

    fn lower_third(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<LowerThird>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().lower_thirds.get(&id).cloned()) })
    }

    fn list_lower_thirds(&self) -> BoxFuture<'static, StorageResult<Vec<LowerThird>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.lock();
            let mut rows: Vec<LowerThird> = inner.lower_thirds.values().cloned().collect();
            rows.sort_by_key(|row| (row.display_order, row.id));
            Ok(rows)
        })
    }

    fn upsert_lower_third(
        &self,
        mut lower_third: LowerThird,
    ) -> BoxFuture<'static, StorageResult<LowerThird>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if lower_third.id == 0 {
                inner.next_lower_third_id += 1;
                lower_third.id = inner.next_lower_third_id;
            }
            inner
                .lower_thirds
                .insert(lower_third.id, lower_third.clone());
            Ok(lower_third)
        })
    }

    fn list_sponsor_slides(&self) -> BoxFuture<'static, StorageResult<Vec<SponsorSlide>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.lock();
            let mut rows: Vec<SponsorSlide> = inner.sponsor_slides.values().cloned().collect();
            rows.sort_by_key(|row| (row.display_order, row.id));
            Ok(rows)
        })
    }

    fn upsert_sponsor_slide(
        &self,
        mut slide: SponsorSlide,
    ) -> BoxFuture<'static, StorageResult<SponsorSlide>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if slide.id == 0 {
                inner.next_sponsor_slide_id += 1;
                slide.id = inner.next_sponsor_slide_id;
            }
            inner.sponsor_slides.insert(slide.id, slide.clone());
            Ok(slide)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchType;

    #[tokio::test]
    async fn create_match_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store
            .create_match(Match::new(MatchType::Qualification, 1, "Q1"))
            .await
            .unwrap();
        let second = store
            .create_match(Match::new(MatchType::Qualification, 2, "Q2"))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn list_matches_filters_and_orders_by_type_order() {
        let store = MemoryStore::new();
        store
            .create_match(Match::new(MatchType::Qualification, 2, "Q2"))
            .await
            .unwrap();
        store
            .create_match(Match::new(MatchType::Practice, 1, "P1"))
            .await
            .unwrap();
        store
            .create_match(Match::new(MatchType::Qualification, 1, "Q1"))
            .await
            .unwrap();

        let quals = store.list_matches(MatchType::Qualification).await.unwrap();
        let names: Vec<&str> = quals.iter().map(|m| m.short_name.as_str()).collect();
        assert_eq!(names, ["Q1", "Q2"]);
    }

    #[tokio::test]
    async fn play_numbers_increase_per_match() {
        let store = MemoryStore::new();
        let m = store
            .create_match(Match::new(MatchType::Qualification, 1, "Q1"))
            .await
            .unwrap();

        let first = store
            .create_match_result(MatchResult::new(m.id, MatchType::Qualification))
            .await
            .unwrap();
        let second = store
            .create_match_result(MatchResult::new(m.id, MatchType::Qualification))
            .await
            .unwrap();
        assert_eq!(first.play_number, 1);
        assert_eq!(second.play_number, 2);

        let latest = store.latest_match_result(m.id).await.unwrap().unwrap();
        assert_eq!(latest.play_number, 2);
    }

    #[tokio::test]
    async fn update_missing_match_is_not_found() {
        let store = MemoryStore::new();
        let mut m = Match::new(MatchType::Playoff, 1, "F-1");
        m.id = 99;
        let err = store.update_match(m).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
