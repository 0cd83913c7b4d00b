//! End-to-end arena behavior driven through manual clock ticks.
//!
//! The tokio clock is paused so every test steps time explicitly and the
//! per-period boundaries land exactly where the timing configuration puts
//! them. State is observed the way websocket clients observe it, through the
//! notifier topic frames.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use tokio::time::{self, Instant};
use uuid::Uuid;

use fieldhub::arena::{Arena, SharedArena, StationId};
use fieldhub::config::AppConfig;
use fieldhub::models::{
    AllianceColor, EventSettings, Match, MatchStatus, MatchType, ScoringPhase, SponsorSlide,
};
use fieldhub::network::NoopNetworkConfigurator;
use fieldhub::notify::Notifier;
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

async fn arena() -> SharedArena {
    arena_with_store(MemoryStore::new()).await
}

fn bypass_all(arena: &SharedArena) {
    for station in StationId::ALL {
        arena.set_station_bypass(station, true);
    }
}

/// The match state as a websocket client would see it in the matchTime topic.
fn current_state(arena: &SharedArena) -> String {
    frame_data(&arena.notifiers().match_time)["matchState"]
        .as_str()
        .expect("match state string")
        .to_string()
}

fn frame_data(notifier: &Notifier) -> Value {
    notifier.initial_frame().expect("initial frame").data
}

#[tokio::test(start_paused = true)]
async fn start_refuses_until_every_station_is_accounted_for() {
    let arena = arena().await;

    // The default test match has no teams and nothing bypassed.
    let err = arena.start_match(Instant::now()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot start match: station R1 has no team and is not bypassed"
    );

    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    assert_eq!(current_state(&arena), "startMatch");

    // A match is already underway.
    assert!(arena.start_match(Instant::now()).is_err());
}

#[tokio::test(start_paused = true)]
async fn match_runs_through_its_periods_on_the_clock() {
    let arena = arena().await;
    bypass_all(&arena);
    let mut sounds = arena.notifiers().play_sound.listen();

    arena.start_match(Instant::now()).unwrap();
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("start")));

    // Default timing has no warmup, so the first tick enters autonomous.
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "auto");

    time::advance(Duration::from_secs(15)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "pause");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("end-auto")));

    time::advance(Duration::from_secs(3)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "teleop");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("resume")));

    // The endgame warning fires once 30 seconds remain.
    time::advance(Duration::from_secs(105)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "teleop");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("warning")));

    time::advance(Duration::from_secs(30)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "postMatch");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("end")));
    assert!(sounds.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn auto_end_sounds_even_without_a_pause_period() {
    let arena = arena().await;
    let mut settings = EventSettings::default();
    settings.timing.pause = Duration::ZERO;
    arena.update_event_settings(settings).await.unwrap();
    bypass_all(&arena);
    let mut sounds = arena.notifiers().play_sound.listen();

    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("start")));

    // Autonomous rolls straight into teleop, marked by the auto-end horn.
    time::advance(Duration::from_secs(15)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "teleop");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("end-auto")));
    assert!(sounds.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn emergency_stops_latch_while_the_match_runs() {
    let arena = arena().await;
    bypass_all(&arena);

    arena.set_station_estop(StationId::B1, true);
    let err = arena.start_match(Instant::now()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot start match: station B1 is emergency stopped"
    );

    // Before the match the stop can still be cleared.
    arena.set_station_estop(StationId::B1, false);
    arena.start_match(Instant::now()).unwrap();
    time::advance(Duration::from_secs(5)).await;
    arena.tick(Instant::now());

    arena.set_station_estop(StationId::R2, true);
    arena.set_station_estop(StationId::R2, false);
    let status = frame_data(&arena.notifiers().arena_status);
    assert_eq!(status["stations"]["R2"]["estop"], json!(true));

    arena.abort_match().unwrap();
    arena.reset_match().unwrap();

    // Reset clears both the latched stop and every bypass.
    let status = frame_data(&arena.notifiers().arena_status);
    assert_eq!(status["stations"]["R2"]["estop"], json!(false));
    assert_eq!(status["stations"]["R1"]["bypass"], json!(false));
}

#[tokio::test(start_paused = true)]
async fn abort_ends_the_match_and_reset_returns_to_pre_match() {
    let arena = arena().await;
    assert!(arena.abort_match().is_err());
    assert!(arena.reset_match().is_err());

    bypass_all(&arena);
    let mut sounds = arena.notifiers().play_sound.listen();
    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("start")));

    arena.abort_match().unwrap();
    assert_eq!(current_state(&arena), "postMatch");
    assert_eq!(sounds.try_recv().map(|f| f.data), Some(json!("abort")));

    // Aborting twice is rejected; the match has already ended.
    assert!(arena.abort_match().is_err());

    arena.reset_match().unwrap();
    assert_eq!(current_state(&arena), "preMatch");
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_down_and_returns_to_pre_match() {
    let arena = arena().await;

    let err = arena
        .start_timeout("break".into(), Duration::ZERO, Instant::now())
        .unwrap_err();
    assert!(err.to_string().contains("must be positive"));

    arena
        .start_timeout("Field fault".into(), Duration::from_secs(60), Instant::now())
        .unwrap();
    assert_eq!(current_state(&arena), "timeoutActive");
    let status = frame_data(&arena.notifiers().arena_status);
    assert_eq!(status["timeoutDescription"], json!("Field fault"));
    assert_eq!(
        frame_data(&arena.notifiers().alliance_station_display_mode),
        json!("timeout")
    );

    // Only one timeout at a time.
    assert!(
        arena
            .start_timeout("again".into(), Duration::from_secs(5), Instant::now())
            .is_err()
    );

    // Loading has to wait for the field to clear the timeout.
    assert!(arena.load_test_match().await.is_err());
    assert_eq!(current_state(&arena), "timeoutActive");

    time::advance(Duration::from_secs(60)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "postTimeout");

    time::advance(Duration::from_secs(4)).await;
    arena.tick(Instant::now());
    assert_eq!(current_state(&arena), "preMatch");
    assert_eq!(
        frame_data(&arena.notifiers().alliance_station_display_mode),
        json!("match")
    );
    let status = frame_data(&arena.notifiers().arena_status);
    assert!(status.get("timeoutDescription").is_none());

    // Back in pre-match the deferred load goes through.
    arena.load_test_match().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn aborting_a_timeout_restores_the_station_displays() {
    let arena = arena().await;
    arena
        .start_timeout("strategy".into(), Duration::from_secs(300), Instant::now())
        .unwrap();

    time::advance(Duration::from_secs(10)).await;
    arena.tick(Instant::now());
    arena.abort_match().unwrap();
    assert_eq!(current_state(&arena), "postMatch");
    assert_eq!(
        frame_data(&arena.notifiers().alliance_station_display_mode),
        json!("match")
    );
}

#[tokio::test(start_paused = true)]
async fn committed_scores_persist_and_feed_the_rankings() {
    let store = MemoryStore::new();
    let mut q1 = Match::new(MatchType::Qualification, 1, "Q1");
    q1.red1 = 101;
    q1.red2 = 102;
    q1.red3 = 103;
    q1.blue1 = 104;
    q1.blue2 = 105;
    q1.blue3 = 106;
    let q1 = store.create_match(q1).await.unwrap();
    store
        .create_match(Match::new(MatchType::Qualification, 2, "Q2"))
        .await
        .unwrap();

    let arena = arena_with_store(store.clone()).await;
    arena.load_match(q1.id).await.unwrap();
    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());
    arena.abort_match().unwrap();

    let err = arena.commit_match_score().await.unwrap_err();
    assert!(err.to_string().contains("both alliances"));

    arena
        .with_score(AllianceColor::Red, |score| {
            score.adjust_pieces(ScoringPhase::Teleop, 4)?;
            score.commit_teleop();
            Ok(())
        })
        .unwrap();
    arena
        .with_score(AllianceColor::Blue, |score| {
            score.commit_teleop();
            Ok(())
        })
        .unwrap();

    arena.commit_match_score().await.unwrap();
    let err = arena.commit_match_score().await.unwrap_err();
    assert!(err.to_string().contains("already committed"));

    let stored = store.match_by_id(q1.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::RedWon);
    let result = store.latest_match_result(q1.id).await.unwrap().unwrap();
    assert_eq!(result.play_number, 1);
    assert_eq!(result.red_score.teleop_pieces, 4);

    let rankings = store.list_rankings().await.unwrap();
    assert_eq!(rankings.len(), 6);
    assert!(
        rankings
            .iter()
            .take(3)
            .all(|r| [101, 102, 103].contains(&r.team_id))
    );

    let posted = frame_data(&arena.notifiers().score_posted);
    assert_eq!(posted["match"]["shortName"], json!("Q1"));
    assert_eq!(posted["redSummary"]["score"], json!(8));

    // The schedule moves on to the next unplayed qualification match.
    arena.load_next_match(false).await.unwrap();
    let load = frame_data(&arena.notifiers().match_load);
    assert_eq!(load["match"]["shortName"], json!("Q2"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_schedule_falls_back_to_the_test_match() {
    let store = MemoryStore::new();
    let mut p1 = Match::new(MatchType::Practice, 1, "P1");
    p1.status = MatchStatus::Tied;
    store.create_match(p1).await.unwrap();

    let arena = arena_with_store(store.clone()).await;
    let practice = store.list_matches(MatchType::Practice).await.unwrap();
    arena.load_match(practice[0].id).await.unwrap();

    arena.load_next_match(false).await.unwrap();
    let load = frame_data(&arena.notifiers().match_load);
    assert_eq!(load["match"]["matchType"], json!("test"));
}

#[tokio::test(start_paused = true)]
async fn substitution_is_limited_to_test_and_practice_matches() {
    let store = MemoryStore::new();
    let q = store
        .create_match(Match::new(MatchType::Qualification, 1, "Q1"))
        .await
        .unwrap();
    let arena = arena_with_store(store).await;

    // The default loaded match is the test match.
    arena.substitute_teams([1, 2, 3, 4, 5, 6]).await.unwrap();
    let load = frame_data(&arena.notifiers().match_load);
    assert_eq!(load["teams"]["R1"]["id"], json!(1));
    assert_eq!(load["teams"]["B3"]["id"], json!(6));
    assert_eq!(load["allowSubstitution"], json!(true));

    arena.load_match(q.id).await.unwrap();
    let err = arena.substitute_teams([1, 2, 3, 4, 5, 6]).await.unwrap_err();
    assert!(err.to_string().contains("test and practice"));
    let load = frame_data(&arena.notifiers().match_load);
    assert_eq!(load["allowSubstitution"], json!(false));
}

#[tokio::test(start_paused = true)]
async fn loading_waits_for_the_field_to_return_to_pre_match() {
    let arena = arena().await;
    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());

    let err = arena.load_test_match().await.unwrap_err();
    assert!(err.to_string().contains("pre-match"));

    // Scores are still pending in post-match; loading stays blocked.
    arena.abort_match().unwrap();
    assert_eq!(current_state(&arena), "postMatch");
    assert!(arena.load_test_match().await.is_err());

    arena.reset_match().unwrap();
    arena.load_test_match().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn uncommit_reopens_an_alliance_score_until_posted() {
    let arena = arena().await;

    // Nothing to reopen before a match has ended.
    assert!(arena.uncommit_score(AllianceColor::Red).is_err());

    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    arena.tick(Instant::now());
    arena.abort_match().unwrap();

    arena
        .with_score(AllianceColor::Red, |score| {
            score.commit_teleop();
            Ok(())
        })
        .unwrap();
    let status = frame_data(&arena.notifiers().scoring_status);
    assert_eq!(status["redScoreCommitted"], json!(true));
    assert_eq!(status["blueScoreCommitted"], json!(false));

    // Committed scores refuse further edits until reopened.
    let err = arena
        .with_score(AllianceColor::Red, |score| {
            score.adjust_pieces(ScoringPhase::Auto, 1)
        })
        .unwrap_err();
    assert!(err.to_string().contains("already committed"));

    arena.uncommit_score(AllianceColor::Red).unwrap();
    arena
        .with_score(AllianceColor::Red, |score| {
            score.adjust_pieces(ScoringPhase::Auto, 1)
        })
        .unwrap();
    let realtime = frame_data(&arena.notifiers().realtime_score);
    assert_eq!(realtime["red"]["score"]["autoPieces"], json!(1));

    // Resetting the field closes the correction window.
    arena.reset_match().unwrap();
    let err = arena.uncommit_score(AllianceColor::Red).unwrap_err();
    assert!(err.to_string().contains("post-match"));
}

#[tokio::test(start_paused = true)]
async fn event_settings_apply_to_the_next_loaded_match() {
    let arena = arena().await;
    let mut settings = EventSettings::default();
    settings.name = "Chezy Champs".into();
    settings.timing.auto = Duration::from_secs(10);
    arena.update_event_settings(settings.clone()).await.unwrap();

    // No match underway, so the timing applies immediately.
    assert_eq!(frame_data(&arena.notifiers().match_timing)["auto"], json!(10));
    assert_eq!(
        frame_data(&arena.notifiers().event_status)["eventName"],
        json!("Chezy Champs")
    );

    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    settings.timing.auto = Duration::from_secs(99);
    arena.update_event_settings(settings).await.unwrap();

    // The running match keeps the timing it started with.
    assert_eq!(frame_data(&arena.notifiers().match_timing)["auto"], json!(10));
}

#[tokio::test(start_paused = true)]
async fn sponsor_slides_persist_and_reach_the_displays() {
    let store = MemoryStore::new();
    let arena = arena_with_store(store.clone()).await;
    assert_eq!(frame_data(&arena.notifiers().sponsor_slides), json!([]));

    arena
        .set_sponsor_slide(SponsorSlide {
            id: 0,
            subtitle: "Gold".into(),
            line1: "Acme Robotics".into(),
            line2: String::new(),
            display_order: 2,
        })
        .await
        .unwrap();
    arena
        .set_sponsor_slide(SponsorSlide {
            id: 0,
            subtitle: "Title".into(),
            line1: "Widget Works".into(),
            line2: "and friends".into(),
            display_order: 1,
        })
        .await
        .unwrap();

    // The rotation replays in display order for (re)connecting displays.
    let slides = frame_data(&arena.notifiers().sponsor_slides);
    assert_eq!(slides[0]["line1"], json!("Widget Works"));
    assert_eq!(slides[1]["line1"], json!("Acme Robotics"));

    // Stored rows survive an arena restart.
    let reopened = arena_with_store(store).await;
    let slides = frame_data(&reopened.notifiers().sponsor_slides);
    assert_eq!(slides.as_array().map(Vec::len), Some(2));
}

#[tokio::test(start_paused = true)]
async fn cycle_time_measures_the_gap_between_match_starts() {
    let arena = arena().await;
    bypass_all(&arena);
    arena.start_match(Instant::now()).unwrap();
    assert_eq!(
        frame_data(&arena.notifiers().event_status)["lastCycleTimeSec"],
        Value::Null
    );

    arena.abort_match().unwrap();
    arena.reset_match().unwrap();
    bypass_all(&arena);
    time::advance(Duration::from_secs(480)).await;
    arena.start_match(Instant::now()).unwrap();
    assert_eq!(
        frame_data(&arena.notifiers().event_status)["lastCycleTimeSec"],
        json!(480.0)
    );
}

#[tokio::test(start_paused = true)]
async fn display_registry_tracks_connections_and_renames() {
    let arena = arena().await;
    let id = Uuid::new_v4();
    arena.register_display(id, "audience".into());
    let displays = frame_data(&arena.notifiers().display_configuration);
    assert_eq!(displays[0]["nickname"], json!("audience"));

    arena.set_display_nickname(id, "pit".into()).unwrap();
    let displays = frame_data(&arena.notifiers().display_configuration);
    assert_eq!(displays[0]["nickname"], json!("pit"));

    assert!(arena.set_display_nickname(Uuid::new_v4(), "x".into()).is_err());

    arena.deregister_display(id);
    assert_eq!(
        frame_data(&arena.notifiers().display_configuration),
        json!([])
    );
}
