//! Playoff bracket progression driven through the arena's commit pipeline.
//!
//! Every match here is played the way an operator would play it: load, start,
//! end, referee sign-off, score commit. The bracket updates ride on the
//! commit, so these tests double as coverage for the playoff leg of
//! `commit_match_score`.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;

use fieldhub::arena::{Arena, SharedArena, StationId};
use fieldhub::config::AppConfig;
use fieldhub::models::{Alliance, AllianceColor, MatchType, ScoringPhase, Team};
use fieldhub::network::NoopNetworkConfigurator;
use fieldhub::store::{MemoryStore, Store};

async fn arena_with_store(store: MemoryStore) -> SharedArena {
    Arena::new(
        Arc::new(store),
        AppConfig::default(),
        Arc::new(NoopNetworkConfigurator),
        StdRng::seed_from_u64(7),
    )
    .await
    .expect("arena construction")
}

fn alliance_teams(number: u32) -> Vec<u32> {
    vec![number * 100 + 1, number * 100 + 2, number * 100 + 3]
}

/// Seed `count` alliances through the arena, creating the opening round.
async fn setup_alliances(arena: &SharedArena, store: &MemoryStore, count: u32) {
    for number in 1..=count {
        for team_id in alliance_teams(number) {
            store
                .upsert_team(Team::new(team_id, format!("Team {team_id}")))
                .await
                .unwrap();
        }
    }
    let alliances = (1..=count)
        .map(|number| Alliance::new(number, alliance_teams(number)))
        .collect();
    arena.update_alliances(alliances).await.unwrap();
}

#[derive(Clone, Copy)]
enum Outcome {
    Red,
    Blue,
    Tie,
}

/// Play the named playoff match to the given outcome, operator-style.
async fn play(arena: &SharedArena, store: &MemoryStore, name: &str, outcome: Outcome) {
    let id = store
        .list_matches(MatchType::Playoff)
        .await
        .unwrap()
        .iter()
        .find(|m| m.short_name == name)
        .unwrap_or_else(|| panic!("no playoff match named {name}"))
        .id;
    arena.load_match(id).await.unwrap();
    for station in StationId::ALL {
        arena.set_station_bypass(station, true);
    }
    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());
    arena.abort_match().unwrap();

    let (red_pieces, blue_pieces) = match outcome {
        Outcome::Red => (2, 0),
        Outcome::Blue => (0, 2),
        Outcome::Tie => (0, 0),
    };
    arena
        .with_score(AllianceColor::Red, |score| {
            score.adjust_pieces(ScoringPhase::Teleop, red_pieces)?;
            score.commit_teleop();
            Ok(())
        })
        .unwrap();
    arena
        .with_score(AllianceColor::Blue, |score| {
            score.adjust_pieces(ScoringPhase::Teleop, blue_pieces)?;
            score.commit_teleop();
            Ok(())
        })
        .unwrap();
    arena.commit_match_score().await.unwrap();
    arena.reset_match().unwrap();
}

fn names(matches: &[fieldhub::models::Match]) -> Vec<&str> {
    matches.iter().map(|m| m.short_name.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn alliance_selection_creates_the_opening_round() {
    let store = MemoryStore::new();
    let arena = arena_with_store(store.clone()).await;
    setup_alliances(&arena, &store, 4).await;

    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert_eq!(matches.len(), 6);
    for name in ["SF1-1", "SF1-2", "SF1-3", "SF2-1", "SF2-2", "SF2-3"] {
        assert!(names(&matches).contains(&name), "missing {name}");
    }

    let sf1 = matches.iter().find(|m| m.short_name == "SF1-1").unwrap();
    assert_eq!(sf1.playoff_red_alliance, 1);
    assert_eq!(sf1.playoff_blue_alliance, 4);
    let mut red = [sf1.red1, sf1.red2, sf1.red3];
    red.sort_unstable();
    assert_eq!(red.to_vec(), alliance_teams(1));

    // New instances spread out from the start time at the configured spacing.
    let sf1_2 = matches.iter().find(|m| m.short_name == "SF1-2").unwrap();
    assert_eq!((sf1_2.scheduled_at - sf1.scheduled_at).whole_seconds(), 1200);
}

#[tokio::test(start_paused = true)]
async fn semifinal_results_seed_and_decide_the_final() {
    let store = MemoryStore::new();
    let arena = arena_with_store(store.clone()).await;
    setup_alliances(&arena, &store, 4).await;

    // Alliance 1 sweeps SF1; the unused third instance goes away and the
    // final appears with the red side known.
    play(&arena, &store, "SF1-1", Outcome::Red).await;
    play(&arena, &store, "SF1-2", Outcome::Red).await;
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert!(!names(&matches).contains(&"SF1-3"));
    let final_1 = matches.iter().find(|m| m.short_name == "F-1").unwrap();
    assert_eq!(final_1.playoff_red_alliance, 1);
    assert_eq!(final_1.playoff_blue_alliance, 0);

    // SF2 needs its third match after a tie; it is still on the schedule.
    play(&arena, &store, "SF2-1", Outcome::Blue).await;
    play(&arena, &store, "SF2-2", Outcome::Tie).await;
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert!(names(&matches).contains(&"SF2-3"));

    play(&arena, &store, "SF2-3", Outcome::Blue).await;
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    let final_1 = matches.iter().find(|m| m.short_name == "F-1").unwrap();
    assert_eq!(final_1.playoff_blue_alliance, 3);
    let mut blue = [final_1.blue1, final_1.blue2, final_1.blue3];
    blue.sort_unstable();
    assert_eq!(blue.to_vec(), alliance_teams(3));

    // Sweep the final; the spare instance is pruned with the bracket done.
    play(&arena, &store, "F-1", Outcome::Red).await;
    play(&arena, &store, "F-2", Outcome::Red).await;
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert!(!names(&matches).contains(&"F-3"));
    assert!(matches.iter().all(|m| m.is_complete()));
}

#[tokio::test(start_paused = true)]
async fn fully_tied_series_grows_until_someone_wins() {
    let store = MemoryStore::new();
    let arena = arena_with_store(store.clone()).await;
    setup_alliances(&arena, &store, 2).await;

    play(&arena, &store, "F-1", Outcome::Tie).await;
    play(&arena, &store, "F-2", Outcome::Blue).await;
    play(&arena, &store, "F-3", Outcome::Tie).await;

    // Two ties to replay; each gets a fresh instance with the same teams.
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert!(names(&matches).contains(&"F-4"));
    assert!(names(&matches).contains(&"F-5"));
    let f1 = matches.iter().find(|m| m.short_name == "F-1").unwrap();
    let f4 = matches.iter().find(|m| m.short_name == "F-4").unwrap();
    assert_eq!(f4.team_ids(), f1.team_ids());

    play(&arena, &store, "F-4", Outcome::Blue).await;
    let matches = store.list_matches(MatchType::Playoff).await.unwrap();
    assert!(!names(&matches).contains(&"F-5"));
    assert!(matches.iter().all(|m| m.is_complete()));
}

#[tokio::test(start_paused = true)]
async fn alliances_with_partial_rosters_are_rejected() {
    let store = MemoryStore::new();
    let arena = arena_with_store(store.clone()).await;

    let alliances = vec![
        Alliance::new(1, alliance_teams(1)),
        Alliance::new(2, vec![201, 202]),
    ];
    let err = arena.update_alliances(alliances).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "alliances must consist of at least 3 teams"
    );
}
