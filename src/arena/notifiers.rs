//! Topic registry connecting the arena to its websocket audiences.
//!
//! Stateful topics carry a producer that rebuilds the current payload from the
//! arena on demand, so a (re)connecting display receives a full snapshot
//! before any incremental frames. Fire-only topics (sounds, display reloads)
//! have no replayable state and no producer.

use std::sync::Weak;

use serde::Serialize;
use serde_json::Value;

use super::Arena;
use crate::notify::Notifier;

/// The arena's notifiers, one per websocket topic.
pub struct ArenaNotifiers {
    /// Loaded match and its team roster.
    pub match_load: Notifier,
    /// Match period and integer seconds elapsed.
    pub match_time: Notifier,
    /// Period durations in effect for loaded matches.
    pub match_timing: Notifier,
    /// Station-by-station field status.
    pub arena_status: Notifier,
    /// Live scores for both alliances.
    pub realtime_score: Notifier,
    /// Most recently committed match result.
    pub score_posted: Notifier,
    /// Audience display screen selection.
    pub audience_display_mode: Notifier,
    /// Alliance station display screen selection.
    pub alliance_station_display_mode: Notifier,
    /// Connected display registry.
    pub display_configuration: Notifier,
    /// Event name and pacing stats.
    pub event_status: Notifier,
    /// Lower third shown on the audience overlay.
    pub lower_third: Notifier,
    /// Sponsor rotation shown between matches.
    pub sponsor_slides: Notifier,
    /// Sound cue trigger; data is the cue name.
    pub play_sound: Notifier,
    /// Orders every display to reload itself.
    pub reload_displays: Notifier,
    /// Playoff alliance roster.
    pub alliance_selection: Notifier,
    /// Per-alliance score commit progress.
    pub scoring_status: Notifier,
}

impl ArenaNotifiers {
    pub(super) fn new(arena: &Weak<Arena>) -> Self {
        Self {
            match_load: Notifier::with_producer(
                "matchLoad",
                producer(arena, |a| json(a.match_load_payload())),
            ),
            match_time: Notifier::with_producer(
                "matchTime",
                producer(arena, |a| json(a.match_time_payload())),
            ),
            match_timing: Notifier::with_producer(
                "matchTiming",
                producer(arena, |a| json(a.match_timing_payload())),
            ),
            arena_status: Notifier::with_producer(
                "arenaStatus",
                producer(arena, |a| json(a.arena_status_payload())),
            ),
            realtime_score: Notifier::with_producer(
                "realtimeScore",
                producer(arena, |a| json(a.realtime_score_payload())),
            ),
            score_posted: Notifier::with_producer(
                "scorePosted",
                producer(arena, |a| a.score_posted_payload().and_then(json)),
            ),
            audience_display_mode: Notifier::with_producer(
                "audienceDisplayMode",
                producer(arena, |a| json(a.audience_display_mode())),
            ),
            alliance_station_display_mode: Notifier::with_producer(
                "allianceStationDisplayMode",
                producer(arena, |a| json(a.alliance_station_display_mode())),
            ),
            display_configuration: Notifier::with_producer(
                "displayConfiguration",
                producer(arena, |a| json(a.display_configuration_payload())),
            ),
            event_status: Notifier::with_producer(
                "eventStatus",
                producer(arena, |a| json(a.event_status_payload())),
            ),
            lower_third: Notifier::with_producer(
                "lowerThird",
                producer(arena, |a| a.lower_third_payload().and_then(json)),
            ),
            sponsor_slides: Notifier::with_producer(
                "sponsorSlides",
                producer(arena, |a| json(a.sponsor_slides_payload())),
            ),
            play_sound: Notifier::new("playSound"),
            reload_displays: Notifier::new("reloadDisplays"),
            alliance_selection: Notifier::with_producer(
                "allianceSelection",
                producer(arena, |a| json(a.alliance_payload())),
            ),
            scoring_status: Notifier::with_producer(
                "scoringStatus",
                producer(arena, |a| json(a.scoring_status_payload())),
            ),
        }
    }

    /// Every topic, for subscribe-all consumers.
    pub fn all(&self) -> [&Notifier; 16] {
        [
            &self.match_load,
            &self.match_time,
            &self.match_timing,
            &self.arena_status,
            &self.realtime_score,
            &self.score_posted,
            &self.audience_display_mode,
            &self.alliance_station_display_mode,
            &self.display_configuration,
            &self.event_status,
            &self.lower_third,
            &self.sponsor_slides,
            &self.play_sound,
            &self.reload_displays,
            &self.alliance_selection,
            &self.scoring_status,
        ]
    }
}

/// Wrap a payload builder into a producer that holds only a weak arena
/// reference. Producers run on subscriber tasks after the arena may have shut
/// down, so a failed upgrade yields no frame rather than a panic.
fn producer(
    arena: &Weak<Arena>,
    build: impl Fn(&Arena) -> Option<Value> + Send + Sync + 'static,
) -> impl Fn() -> Option<Value> + Send + Sync + 'static {
    let arena = arena.clone();
    move || arena.upgrade().as_deref().and_then(&build)
}

fn json<T: Serialize>(payload: T) -> Option<Value> {
    serde_json::to_value(payload).ok()
}
