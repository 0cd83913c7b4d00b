//! Field control core.
//!
//! The [`Arena`] owns the loaded match, the six alliance stations, the live
//! scores, and the clock that advances them. A 10ms tick drives all
//! time-based behavior: match state transitions, driver station control
//! packets, and the once-per-second websocket clock. Operator commands arrive
//! through the websocket service and mutate the same state under one lock.
//!
//! The tick never awaits while holding the state lock, and every notification
//! fires only after the lock is released; notifier producers take the read
//! lock themselves when a subscriber needs a snapshot.

mod notifiers;
mod realtime;
mod state_machine;
mod station;

pub use notifiers::ArenaNotifiers;
pub use realtime::RealtimeScore;
pub use state_machine::{
    ControlFlags, MatchState, POST_TIMEOUT_GRACE, advance, seconds_remaining,
};
pub use station::{AllianceStation, StationId};

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{
    Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::ds::{ControlPacket, DriverStationSession, DsTelemetry};
use crate::dto::events::{
    AllianceScorePayload, ArenaStatusPayload, DisplayInfo, EventStatusPayload, MatchLoadPayload,
    MatchTimePayload, RealtimeScorePayload, ScorePostedPayload, ScoringStatusPayload,
    StationStatus,
};
use crate::error::ArenaError;
use crate::models::{
    Alliance, AllianceColor, AllianceStationDisplayMode, AudienceDisplayMode, EventSettings,
    LowerThird, Match, MatchResult, MatchTiming, MatchType, SponsorSlide, Team,
    calculate_rankings,
};
use crate::network::{COMMAND_TIMEOUT, CONNECT_TIMEOUT, NetworkConfigurator};
use crate::partner::ResultsPublisher;
use crate::playoff::update_playoff_bracket;
use crate::store::Store;

/// Interval between arena clock ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);
/// Steady-state interval between driver station control packets; a state
/// transition sends one immediately.
pub const DS_CONTROL_SEND_INTERVAL: Duration = Duration::from_millis(250);

/// Shared handle to the arena, cloned into every task that needs it.
pub type SharedArena = Arc<Arena>;

struct SessionEntry {
    session: Arc<DriverStationSession>,
    reader: JoinHandle<()>,
}

/// The field control core; one per process.
pub struct Arena {
    store: Arc<dyn Store>,
    config: AppConfig,
    network: Arc<dyn NetworkConfigurator>,
    state: RwLock<ArenaState>,
    notifiers: ArenaNotifiers,
    sessions: DashMap<u32, SessionEntry>,
    displays: DashMap<Uuid, String>,
    rng: Mutex<StdRng>,
}

/// Everything guarded by the arena's single state lock.
struct ArenaState {
    current_match: Match,
    match_state: MatchState,
    timing: MatchTiming,
    period_start: Option<Instant>,
    timeout_duration: Duration,
    timeout_description: String,
    stations: [AllianceStation; 6],
    red_score: RealtimeScore,
    blue_score: RealtimeScore,
    audience_mode: AudienceDisplayMode,
    station_mode: AllianceStationDisplayMode,
    last_ds_sent_at: Option<Instant>,
    last_time_notified: Option<u64>,
    warning_played: bool,
    score_committed: bool,
    settings: EventSettings,
    alliances: Vec<Alliance>,
    last_score_posted: Option<ScorePostedPayload>,
    lower_third: Option<LowerThird>,
    sponsor_slides: Vec<SponsorSlide>,
    last_match_started: Option<Instant>,
    last_cycle_time: Option<Duration>,
}

impl Arena {
    /// Create the arena with the test match loaded and settings read from the
    /// store.
    pub async fn new(
        store: Arc<dyn Store>,
        config: AppConfig,
        network: Arc<dyn NetworkConfigurator>,
        rng: StdRng,
    ) -> Result<SharedArena, ArenaError> {
        let settings = store.event_settings().await?.unwrap_or_default();
        let alliances = store.list_alliances().await?;
        let sponsor_slides = store.list_sponsor_slides().await?;
        Ok(Arc::new_cyclic(|weak| Arena {
            notifiers: ArenaNotifiers::new(weak),
            store,
            config,
            network,
            state: RwLock::new(ArenaState::new(settings, alliances, sponsor_slides)),
            sessions: DashMap::new(),
            displays: DashMap::new(),
            rng: Mutex::new(rng),
        }))
    }

    /// Runtime configuration the arena was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The websocket topic registry.
    pub fn notifiers(&self) -> &ArenaNotifiers {
        &self.notifiers
    }

    // ---- clock ------------------------------------------------------------

    /// Run the arena clock until the process exits.
    pub async fn run_tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let now = Instant::now();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.tick(now))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".into());
                error!(%reason, "arena tick panicked");
            }
        }
    }

    /// Advance the arena by one clock tick.
    ///
    /// Performs at most one state transition, sends driver station control
    /// packets when due, and queues websocket notifications that fire after
    /// the state lock is released.
    pub fn tick(&self, now: Instant) {
        for entry in self.sessions.iter() {
            entry.value().session.check_liveness(now);
        }

        let mut sound: Option<&'static str> = None;
        let mut notify_match_time = false;
        let mut notify_arena_status = false;
        let mut notify_audience_mode = false;
        let mut notify_station_mode = false;

        {
            let mut state = self.write_state();
            let elapsed = state.elapsed(now);
            let prev = state.match_state;
            let next = advance(prev, elapsed, &state.timing, state.timeout_duration);
            let transitioned = next != prev;

            if transitioned {
                state.match_state = next;
                match (prev, next) {
                    // Zero pause jumps straight to teleop; the auto-end horn
                    // still marks the boundary.
                    (MatchState::Auto, MatchState::Pause | MatchState::Teleop) => {
                        sound = Some("end-auto");
                    }
                    (MatchState::Pause, MatchState::Teleop) => sound = Some("resume"),
                    (MatchState::Teleop, MatchState::PostMatch) => {
                        sound = Some("end");
                        for station in &state.stations {
                            if let Some(ds) = &station.ds {
                                ds.stop_logging();
                            }
                        }
                    }
                    (MatchState::PostTimeout, MatchState::PreMatch) => {
                        state.period_start = None;
                        state.audience_mode = AudienceDisplayMode::Blank;
                        state.station_mode = AllianceStationDisplayMode::Match;
                        notify_audience_mode = true;
                        notify_station_mode = true;
                    }
                    _ => {}
                }
            }

            // The endgame warning plays once per match; a transition sound in
            // the same tick takes priority and the warning fires next tick.
            if sound.is_none()
                && state.match_state == MatchState::Teleop
                && !state.warning_played
                && !state.timing.warning_remaining.is_zero()
            {
                let remaining = state.timing.match_end().saturating_sub(elapsed);
                if remaining <= state.timing.warning_remaining {
                    state.warning_played = true;
                    sound = Some("warning");
                }
            }

            let send_due = state
                .last_ds_sent_at
                .is_none_or(|at| now.duration_since(at) >= DS_CONTROL_SEND_INTERVAL);
            if transitioned || send_due {
                state.last_ds_sent_at = Some(now);
                state.send_control_packets(elapsed, OffsetDateTime::now_utc());
                notify_arena_status = true;
            }

            let seconds = elapsed.as_secs();
            if transitioned || state.last_time_notified != Some(seconds) {
                state.last_time_notified = Some(seconds);
                notify_match_time = true;
            }
        }

        if let Some(name) = sound {
            self.notifiers.play_sound.notify_with(json!(name));
        }
        if notify_match_time {
            self.notifiers.match_time.notify();
        }
        if notify_arena_status {
            self.notifiers.arena_status.notify();
        }
        if notify_audience_mode {
            self.notifiers.audience_display_mode.notify();
        }
        if notify_station_mode {
            self.notifiers.alliance_station_display_mode.notify();
        }
    }

    // ---- match selection --------------------------------------------------

    /// Load the stored match with the given id onto the field.
    pub async fn load_match(&self, match_id: i64) -> Result<(), ArenaError> {
        let m = self
            .store
            .match_by_id(match_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("no match with id {match_id}")))?;
        self.install_match(m).await
    }

    /// Load the empty test match used for field checkout.
    pub async fn load_test_match(&self) -> Result<(), ArenaError> {
        self.install_match(Match::test()).await
    }

    /// Load the earliest unplayed match of the current match's type, falling
    /// back to the test match when the schedule is exhausted.
    pub async fn load_next_match(&self, start_scheduled_break: bool) -> Result<(), ArenaError> {
        if start_scheduled_break {
            debug!("scheduled breaks are not supported; loading the next match directly");
        }
        let current_type = self.read_state().current_match.match_type;
        if current_type == MatchType::Test {
            return self.install_match(Match::test()).await;
        }
        let next = self
            .store
            .list_matches(current_type)
            .await?
            .into_iter()
            .find(|m| !m.is_complete());
        match next {
            Some(m) => self.install_match(m).await,
            None => {
                info!(match_type = ?current_type, "schedule exhausted; loading the test match");
                self.install_match(Match::test()).await
            }
        }
    }

    /// Replace the loaded match's teams, station by station.
    ///
    /// Only test and practice matches accept substitutions; the change is
    /// persisted for stored matches.
    pub async fn substitute_teams(&self, team_ids: [u32; 6]) -> Result<(), ArenaError> {
        let mut m = {
            let state = self.read_state();
            if !matches!(
                state.current_match.match_type,
                MatchType::Test | MatchType::Practice
            ) {
                return Err(ArenaError::state(
                    "teams can only be substituted in test and practice matches",
                ));
            }
            state.current_match.clone()
        };
        for (index, team_id) in team_ids.into_iter().enumerate() {
            m.set_team(index, team_id);
        }
        if m.id != 0 {
            self.store.update_match(m.clone()).await?;
        }
        self.install_match(m).await
    }

    async fn install_match(&self, mut m: Match) -> Result<(), ArenaError> {
        if self.read_state().match_state != MatchState::PreMatch {
            return Err(ArenaError::state(
                "cannot load a match until the field returns to pre-match",
            ));
        }

        // Playoff lineups can be overridden by the partner site right up to
        // match load; a fetch failure keeps the stored lineup.
        if m.match_type == MatchType::Playoff {
            let lineup_base = self.read_state().settings.lineup_base_url.clone();
            if let Some(base) = lineup_base {
                match crate::partner::fetch_lineup(&base, &m.short_name).await {
                    Ok(lineup) => {
                        for (index, team_id) in lineup.team_ids().into_iter().enumerate() {
                            if team_id != 0 {
                                m.set_team(index, team_id);
                            }
                        }
                    }
                    Err(err) => warn!(
                        %err,
                        match_name = %m.short_name,
                        "failed to fetch partner lineup"
                    ),
                }
            }
        }

        // Resolve the roster before touching arena state; unknown ids still
        // occupy their station so the match can proceed.
        let mut teams: [Option<Team>; 6] = Default::default();
        for (slot, team_id) in m.team_ids().into_iter().enumerate() {
            if team_id == 0 {
                continue;
            }
            teams[slot] = Some(match self.store.team(team_id).await? {
                Some(team) => team,
                None => {
                    warn!(team = team_id, "team is not in the database");
                    Team::new(team_id, "")
                }
            });
        }

        let network_teams = teams.clone();
        let mut stale: Vec<Arc<DriverStationSession>> = Vec::new();
        {
            let mut state = self.write_state();
            let mut stations: [AllianceStation; 6] = Default::default();
            for (index, team) in teams.into_iter().enumerate() {
                let mut station = AllianceStation::with_team(team);
                let old = &mut state.stations[index];
                if old.team_id() == station.team_id() {
                    station.ds = old.ds.take();
                } else if let Some(ds) = old.ds.take() {
                    stale.push(ds);
                }
                stations[index] = station;
            }
            state.stations = stations;
            state.current_match = m;
            // Loading during a timeout leaves the timeout clock running.
            if !state.match_state.is_timeout() {
                state.match_state = MatchState::PreMatch;
                state.period_start = None;
            }
            state.red_score = RealtimeScore::default();
            state.blue_score = RealtimeScore::default();
            state.score_committed = false;
            state.warning_played = false;
            state.last_time_notified = None;
            let timing = state.settings.timing.clone();
            state.timing = timing;
        }
        for ds in stale {
            self.close_session(ds.team_id());
        }
        self.configure_field_network(network_teams);

        self.notifiers.match_load.notify();
        self.notifiers.match_timing.notify();
        self.notifiers.arena_status.notify();
        self.notifiers.realtime_score.notify();
        self.notifiers.scoring_status.notify();
        Ok(())
    }

    fn configure_field_network(&self, teams: [Option<Team>; 6]) {
        let network = Arc::clone(&self.network);
        tokio::spawn(async move {
            let budget = CONNECT_TIMEOUT + COMMAND_TIMEOUT;
            match tokio::time::timeout(budget, network.configure_team_wifi(teams)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(%err, "field network configuration failed"),
                Err(_) => warn!("field network configuration timed out"),
            }
        });
    }

    // ---- match lifecycle --------------------------------------------------

    /// Start the loaded match.
    ///
    /// Fails unless the arena is in `PreMatch` and every station is either
    /// bypassed or has its assigned team's robot linked, with no emergency
    /// stop active.
    pub fn start_match(&self, now: Instant) -> Result<(), ArenaError> {
        let (sessions, match_name) = {
            let mut state = self.write_state();
            if state.match_state != MatchState::PreMatch {
                return Err(ArenaError::state(
                    "a match can only be started from the pre-match state",
                ));
            }
            state.check_ready()?;

            state.match_state = MatchState::StartMatch;
            state.period_start = Some(now);
            state.current_match.started_at = Some(OffsetDateTime::now_utc());
            state.warning_played = false;
            state.last_time_notified = None;
            // Forces a control packet on the next tick.
            state.last_ds_sent_at = None;
            state.audience_mode = AudienceDisplayMode::Match;
            if let Some(previous) = state.last_match_started {
                state.last_cycle_time = Some(now.duration_since(previous));
            }
            state.last_match_started = Some(now);

            let mut sessions = Vec::new();
            for station in &state.stations {
                if let Some(ds) = &station.ds {
                    ds.capture_missed_packet_offset();
                    sessions.push(Arc::clone(ds));
                }
            }
            (sessions, state.current_match.short_name.clone())
        };

        if let Some(dir) = &self.config.ds_log_dir {
            for ds in &sessions {
                ds.start_logging(dir, &match_name, now);
            }
        }

        info!(match_name = %match_name, "match started");
        self.notifiers.play_sound.notify_with(json!("start"));
        self.notifiers.audience_display_mode.notify();
        self.notifiers.event_status.notify();
        self.notifiers.arena_status.notify();
        Ok(())
    }

    /// Abort the running match or timeout, jumping straight to `PostMatch`.
    pub fn abort_match(&self) -> Result<(), ArenaError> {
        let was_timeout = {
            let mut state = self.write_state();
            match state.match_state {
                MatchState::PreMatch => {
                    return Err(ArenaError::state("no match is running"));
                }
                MatchState::PostMatch => {
                    return Err(ArenaError::state("the match has already ended"));
                }
                _ => {}
            }
            let was_timeout = state.match_state.is_timeout();
            state.match_state = MatchState::PostMatch;
            state.audience_mode = AudienceDisplayMode::Blank;
            if was_timeout {
                state.station_mode = AllianceStationDisplayMode::Match;
            }
            for station in &state.stations {
                if let Some(ds) = &station.ds {
                    ds.stop_logging();
                }
            }
            was_timeout
        };

        info!("match aborted");
        self.notifiers.play_sound.notify_with(json!("abort"));
        self.notifiers.audience_display_mode.notify();
        if was_timeout {
            self.notifiers.alliance_station_display_mode.notify();
        }
        self.notifiers.arena_status.notify();
        self.notifiers.match_time.notify();
        Ok(())
    }

    /// Return the field from `PostMatch` to `PreMatch`, clearing per-match
    /// station flags.
    pub fn reset_match(&self) -> Result<(), ArenaError> {
        {
            let mut state = self.write_state();
            if state.match_state != MatchState::PostMatch {
                return Err(ArenaError::state("the match is not in the post-match state"));
            }
            state.match_state = MatchState::PreMatch;
            state.period_start = None;
            state.last_time_notified = None;
            for station in &mut state.stations {
                station.estop = false;
                station.bypass = false;
            }
            state.audience_mode = AudienceDisplayMode::Blank;
        }
        self.notifiers.audience_display_mode.notify();
        self.notifiers.arena_status.notify();
        self.notifiers.match_time.notify();
        Ok(())
    }

    /// Start a field timeout of the given length.
    pub fn start_timeout(
        &self,
        description: String,
        duration: Duration,
        now: Instant,
    ) -> Result<(), ArenaError> {
        if duration.is_zero() {
            return Err(ArenaError::argument("timeout duration must be positive"));
        }
        {
            let mut state = self.write_state();
            if state.match_state != MatchState::PreMatch {
                return Err(ArenaError::state(
                    "a timeout can only start from the pre-match state",
                ));
            }
            state.match_state = MatchState::TimeoutActive;
            state.period_start = Some(now);
            state.timeout_duration = duration;
            state.timeout_description = description;
            state.last_time_notified = None;
            state.audience_mode = AudienceDisplayMode::Timeout;
            state.station_mode = AllianceStationDisplayMode::Timeout;
        }
        info!(duration_sec = duration.as_secs(), "timeout started");
        self.notifiers.audience_display_mode.notify();
        self.notifiers.alliance_station_display_mode.notify();
        self.notifiers.arena_status.notify();
        self.notifiers.match_time.notify();
        Ok(())
    }

    // ---- station flags ----------------------------------------------------

    /// Set or clear a station's emergency stop. Once a match is underway the
    /// stop latches; clear requests are ignored until the match ends.
    pub fn set_station_estop(&self, station: StationId, active: bool) {
        let changed = {
            let mut state = self.write_state();
            let in_progress = state.match_state.is_match_in_progress();
            let slot = &mut state.stations[station.index()];
            if slot.estop == active {
                false
            } else if !active && in_progress {
                info!(%station, "ignoring emergency stop clear during the match");
                false
            } else {
                slot.estop = active;
                true
            }
        };
        if changed {
            info!(%station, active, "station emergency stop changed");
            self.notifiers.arena_status.notify();
        }
    }

    /// Set or clear a station's bypass flag. A bypassed station is excluded
    /// from readiness checks and its robot stays disabled.
    pub fn set_station_bypass(&self, station: StationId, active: bool) {
        let changed = {
            let mut state = self.write_state();
            let slot = &mut state.stations[station.index()];
            if slot.bypass == active {
                false
            } else {
                slot.bypass = active;
                true
            }
        };
        if changed {
            self.notifiers.arena_status.notify();
        }
    }

    // ---- scoring ----------------------------------------------------------

    /// Run a mutation against one alliance's live score.
    pub fn with_score<T>(
        &self,
        alliance: AllianceColor,
        mutate: impl FnOnce(&mut RealtimeScore) -> Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        let result = {
            let mut state = self.write_state();
            mutate(state.score_mut(alliance))
        };
        if result.is_ok() {
            self.notifiers.realtime_score.notify();
            self.notifiers.scoring_status.notify();
        }
        result
    }

    /// Reopen one alliance's committed score for correction. Only available
    /// while the field holds in post-match, and fails once the match score
    /// has been posted.
    pub fn uncommit_score(&self, alliance: AllianceColor) -> Result<(), ArenaError> {
        {
            let mut state = self.write_state();
            if state.match_state != MatchState::PostMatch {
                return Err(ArenaError::state(
                    "scores can only be reopened in post-match",
                ));
            }
            if state.score_committed {
                return Err(ArenaError::state("match score is already committed"));
            }
            state.score_mut(alliance).uncommit();
        }
        self.notifiers.realtime_score.notify();
        self.notifiers.scoring_status.notify();
        Ok(())
    }

    /// Finalize the loaded match's score: persist the result, update whatever
    /// the match type feeds (rankings or the playoff bracket), and publish the
    /// posted score.
    pub async fn commit_match_score(&self) -> Result<(), ArenaError> {
        let (m, result, posted) = {
            let mut state = self.write_state();
            if state.match_state != MatchState::PostMatch {
                return Err(ArenaError::state(
                    "scores can only be committed after the match ends",
                ));
            }
            if !state.red_score.teleop_committed || !state.blue_score.teleop_committed {
                return Err(ArenaError::state(
                    "both alliances must commit their scores first",
                ));
            }
            if state.score_committed {
                return Err(ArenaError::state("match score is already committed"));
            }
            // Claim the commit before any await so a double press fails fast.
            state.score_committed = true;

            let mut result =
                MatchResult::new(state.current_match.id, state.current_match.match_type);
            result.red_score = state.red_score.score.clone();
            result.blue_score = state.blue_score.score.clone();
            result.red_cards = state.red_score.cards.clone();
            result.blue_cards = state.blue_score.cards.clone();

            let mut m = state.current_match.clone();
            m.status = result.status();

            let posted = ScorePostedPayload {
                current_match: m.clone(),
                red_summary: result.summary(AllianceColor::Red),
                blue_summary: result.summary(AllianceColor::Blue),
                red_cards: result.red_cards.clone(),
                blue_cards: result.blue_cards.clone(),
            };
            (m, result, posted)
        };

        if let Err(err) = self.persist_match_result(&m, result).await {
            self.write_state().score_committed = false;
            return Err(err);
        }

        {
            let mut state = self.write_state();
            if state.current_match.id == m.id
                && state.current_match.match_type == m.match_type
            {
                state.current_match.status = m.status;
            }
            state.last_score_posted = Some(posted);
        }
        info!(match_name = %m.short_name, status = ?m.status, "match score committed");
        self.notifiers.score_posted.notify();
        self.notifiers.scoring_status.notify();
        Ok(())
    }

    async fn persist_match_result(
        &self,
        m: &Match,
        result: MatchResult,
    ) -> Result<(), ArenaError> {
        if m.match_type == MatchType::Test {
            return Ok(());
        }
        self.store.update_match(m.clone()).await?;
        let stored = self.store.create_match_result(result).await?;
        match m.match_type {
            MatchType::Qualification => self.recalculate_rankings().await?,
            MatchType::Playoff => {
                self.rebuild_playoff_bracket().await?;
            }
            MatchType::Test | MatchType::Practice => {}
        }
        self.publish_result(m, &stored);
        Ok(())
    }

    async fn recalculate_rankings(&self) -> Result<(), ArenaError> {
        let matches = self.store.list_matches(MatchType::Qualification).await?;
        let mut latest = HashMap::new();
        for m in &matches {
            if !m.is_complete() {
                continue;
            }
            if let Some(result) = self.store.latest_match_result(m.id).await? {
                latest.insert(m.id, result);
            }
        }
        let rankings = calculate_rankings(&matches, &latest);
        self.store.replace_rankings(rankings).await?;
        Ok(())
    }

    async fn rebuild_playoff_bracket(&self) -> Result<Option<u32>, ArenaError> {
        let (start, spacing) = {
            let state = self.read_state();
            (
                state
                    .settings
                    .playoff_start
                    .unwrap_or_else(OffsetDateTime::now_utc),
                state.settings.playoff_match_spacing,
            )
        };
        // Derive a child generator so the master lock never crosses an await.
        let mut rng = {
            let mut master = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            StdRng::from_rng(&mut *master)
        };
        update_playoff_bracket(self.store.as_ref(), start, spacing, &mut rng).await
    }

    fn publish_result(&self, m: &Match, result: &MatchResult) {
        let publishing = self.read_state().settings.publishing.clone();
        let Some(config) = publishing else {
            return;
        };
        let publisher = ResultsPublisher::new(config);
        let m = m.clone();
        let result = result.clone();
        tokio::spawn(async move {
            if let Err(err) = publisher.publish_result(&m, &result).await {
                warn!(%err, match_name = %m.short_name, "failed to publish match result");
            }
        });
    }

    // ---- event administration ---------------------------------------------

    /// Replace the playoff alliances and rebuild the bracket from them.
    pub async fn update_alliances(&self, alliances: Vec<Alliance>) -> Result<(), ArenaError> {
        self.store.replace_alliances(alliances.clone()).await?;
        {
            let mut state = self.write_state();
            state.alliances = alliances.clone();
        }
        self.notifiers.alliance_selection.notify();
        if alliances.len() >= 2 {
            self.rebuild_playoff_bracket().await?;
        }
        Ok(())
    }

    /// Persist new event settings and apply the timing to the next loaded
    /// match; a match already underway keeps its timing.
    pub async fn update_event_settings(&self, settings: EventSettings) -> Result<(), ArenaError> {
        self.store.save_event_settings(settings.clone()).await?;
        {
            let mut state = self.write_state();
            state.settings = settings;
            if !state.match_state.is_match_in_progress() {
                let timing = state.settings.timing.clone();
                state.timing = timing;
            }
        }
        self.notifiers.match_timing.notify();
        self.notifiers.event_status.notify();
        Ok(())
    }

    /// Persist an overlay line pair and show it on the audience display.
    pub async fn set_lower_third(&self, lower_third: LowerThird) -> Result<(), ArenaError> {
        let stored = self.store.upsert_lower_third(lower_third).await?;
        {
            let mut state = self.write_state();
            state.lower_third = Some(stored);
        }
        self.notifiers.lower_third.notify();
        Ok(())
    }

    /// Persist a sponsor slide and refresh the rotation shown on displays.
    pub async fn set_sponsor_slide(&self, slide: SponsorSlide) -> Result<(), ArenaError> {
        self.store.upsert_sponsor_slide(slide).await?;
        let slides = self.store.list_sponsor_slides().await?;
        {
            let mut state = self.write_state();
            state.sponsor_slides = slides;
        }
        self.notifiers.sponsor_slides.notify();
        Ok(())
    }

    // ---- display modes ----------------------------------------------------

    /// Switch the audience display to the given screen.
    pub fn set_audience_display_mode(&self, mode: AudienceDisplayMode) {
        let changed = {
            let mut state = self.write_state();
            if state.audience_mode == mode {
                false
            } else {
                state.audience_mode = mode;
                true
            }
        };
        if changed {
            self.notifiers.audience_display_mode.notify();
        }
    }

    /// Switch the alliance station displays to the given screen.
    pub fn set_alliance_station_display_mode(&self, mode: AllianceStationDisplayMode) {
        let changed = {
            let mut state = self.write_state();
            if state.station_mode == mode {
                false
            } else {
                state.station_mode = mode;
                true
            }
        };
        if changed {
            self.notifiers.alliance_station_display_mode.notify();
        }
    }

    // ---- display registry -------------------------------------------------

    /// Record a connected display.
    pub fn register_display(&self, id: Uuid, nickname: String) {
        self.displays.insert(id, nickname);
        self.notifiers.display_configuration.notify();
    }

    /// Forget a display that has disconnected.
    pub fn deregister_display(&self, id: Uuid) {
        if self.displays.remove(&id).is_some() {
            self.notifiers.display_configuration.notify();
        }
    }

    /// Rename a connected display.
    pub fn set_display_nickname(&self, id: Uuid, nickname: String) -> Result<(), ArenaError> {
        {
            let Some(mut entry) = self.displays.get_mut(&id) else {
                return Err(ArenaError::NotFound(format!("no display {id}")));
            };
            *entry = nickname;
        }
        self.notifiers.display_configuration.notify();
        Ok(())
    }

    /// Order every connected display to reload itself.
    pub fn reload_displays(&self) {
        self.notifiers.reload_displays.notify();
    }

    // ---- driver station registry -------------------------------------------

    /// The station `team_id` is assigned to in the loaded match, if any.
    pub fn station_for_team(&self, team_id: u32) -> Option<StationId> {
        if team_id == 0 {
            return None;
        }
        let state = self.read_state();
        StationId::ALL
            .into_iter()
            .find(|id| state.stations[id.index()].team_id() == team_id)
    }

    /// The live session for `team_id`, if one is connected.
    pub fn session_for_team(&self, team_id: u32) -> Option<Arc<DriverStationSession>> {
        self.sessions.get(&team_id).map(|entry| Arc::clone(&entry.session))
    }

    /// Adopt a freshly handshaken driver station session, replacing any
    /// previous connection for the same team.
    pub fn register_driver_station(
        &self,
        session: Arc<DriverStationSession>,
        reader: JoinHandle<()>,
    ) {
        let team_id = session.team_id();
        {
            let mut state = self.write_state();
            let slot = &mut state.stations[session.station().index()];
            if slot.team_id() != team_id {
                drop(state);
                warn!(
                    team = team_id,
                    station = %session.station(),
                    "station assignment changed during handshake; dropping connection"
                );
                reader.abort();
                return;
            }
            slot.ds = Some(Arc::clone(&session));
        }
        info!(team = team_id, station = %session.station(), "driver station connected");
        if let Some(previous) = self.sessions.insert(team_id, SessionEntry { session, reader }) {
            previous.reader.abort();
        }
        self.notifiers.arena_status.notify();
    }

    /// Drop a session whose TCP connection has closed. A newer session for
    /// the same team is left untouched.
    pub fn detach_driver_station(&self, session: &Arc<DriverStationSession>) {
        let team_id = session.team_id();
        {
            let mut state = self.write_state();
            let slot = &mut state.stations[session.station().index()];
            if slot
                .ds
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, session))
            {
                slot.ds = None;
            }
        }
        self.sessions
            .remove_if(&team_id, |_, entry| Arc::ptr_eq(&entry.session, session));
        info!(team = team_id, "driver station disconnected");
        self.notifiers.arena_status.notify();
    }

    fn close_session(&self, team_id: u32) {
        if let Some((_, entry)) = self.sessions.remove(&team_id) {
            entry.reader.abort();
        }
    }

    // ---- notifier payloads -------------------------------------------------

    fn match_load_payload(&self) -> MatchLoadPayload {
        let state = self.read_state();
        let mut teams = IndexMap::new();
        for (id, station) in StationId::ALL.iter().zip(&state.stations) {
            teams.insert(id.to_string(), station.team.clone());
        }
        MatchLoadPayload {
            allow_substitution: matches!(
                state.current_match.match_type,
                MatchType::Test | MatchType::Practice
            ),
            current_match: state.current_match.clone(),
            teams,
        }
    }

    fn match_time_payload(&self) -> MatchTimePayload {
        let state = self.read_state();
        MatchTimePayload {
            match_state: state.match_state,
            match_time_sec: state.elapsed(Instant::now()).as_secs(),
        }
    }

    fn match_timing_payload(&self) -> MatchTiming {
        self.read_state().timing.clone()
    }

    fn arena_status_payload(&self) -> ArenaStatusPayload {
        let state = self.read_state();
        let mut stations = IndexMap::new();
        for (id, station) in StationId::ALL.iter().zip(&state.stations) {
            let (ds_connected, wrong_station, telemetry) = match &station.ds {
                Some(ds) => (
                    true,
                    ds.wrong_station().map(|s| s.to_string()),
                    ds.telemetry(),
                ),
                None => (false, None, DsTelemetry::default()),
            };
            stations.insert(
                id.to_string(),
                StationStatus {
                    team: station.team.clone(),
                    bypass: station.bypass,
                    estop: station.estop,
                    ds_connected,
                    wrong_station,
                    telemetry,
                },
            );
        }
        ArenaStatusPayload {
            match_state: state.match_state,
            timeout_description: state
                .match_state
                .is_timeout()
                .then(|| state.timeout_description.clone()),
            stations,
        }
    }

    fn realtime_score_payload(&self) -> RealtimeScorePayload {
        let state = self.read_state();
        RealtimeScorePayload {
            red: AllianceScorePayload {
                score: state.red_score.score.clone(),
                summary: state.red_score.summarize(&state.blue_score),
                auto_committed: state.red_score.auto_committed,
                teleop_committed: state.red_score.teleop_committed,
            },
            blue: AllianceScorePayload {
                score: state.blue_score.score.clone(),
                summary: state.blue_score.summarize(&state.red_score),
                auto_committed: state.blue_score.auto_committed,
                teleop_committed: state.blue_score.teleop_committed,
            },
        }
    }

    fn score_posted_payload(&self) -> Option<ScorePostedPayload> {
        self.read_state().last_score_posted.clone()
    }

    fn audience_display_mode(&self) -> AudienceDisplayMode {
        self.read_state().audience_mode
    }

    fn alliance_station_display_mode(&self) -> AllianceStationDisplayMode {
        self.read_state().station_mode
    }

    fn display_configuration_payload(&self) -> Vec<DisplayInfo> {
        let mut displays: Vec<DisplayInfo> = self
            .displays
            .iter()
            .map(|entry| DisplayInfo {
                id: *entry.key(),
                nickname: entry.value().clone(),
            })
            .collect();
        displays.sort_by_key(|display| display.id);
        displays
    }

    fn event_status_payload(&self) -> EventStatusPayload {
        let state = self.read_state();
        EventStatusPayload {
            event_name: state.settings.name.clone(),
            last_cycle_time_sec: state.last_cycle_time.map(|cycle| cycle.as_secs_f64()),
        }
    }

    fn lower_third_payload(&self) -> Option<LowerThird> {
        self.read_state().lower_third.clone()
    }

    fn sponsor_slides_payload(&self) -> Vec<SponsorSlide> {
        self.read_state().sponsor_slides.clone()
    }

    fn alliance_payload(&self) -> Vec<Alliance> {
        self.read_state().alliances.clone()
    }

    fn scoring_status_payload(&self) -> ScoringStatusPayload {
        let state = self.read_state();
        ScoringStatusPayload {
            red_score_committed: state.red_score.teleop_committed,
            blue_score_committed: state.blue_score.teleop_committed,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ArenaState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ArenaState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArenaState {
    fn new(
        settings: EventSettings,
        alliances: Vec<Alliance>,
        sponsor_slides: Vec<SponsorSlide>,
    ) -> Self {
        Self {
            current_match: Match::test(),
            match_state: MatchState::PreMatch,
            timing: settings.timing.clone(),
            period_start: None,
            timeout_duration: Duration::ZERO,
            timeout_description: String::new(),
            stations: Default::default(),
            red_score: RealtimeScore::default(),
            blue_score: RealtimeScore::default(),
            audience_mode: AudienceDisplayMode::Blank,
            station_mode: AllianceStationDisplayMode::Match,
            last_ds_sent_at: None,
            last_time_notified: None,
            warning_played: false,
            score_committed: false,
            settings,
            alliances,
            last_score_posted: None,
            lower_third: None,
            sponsor_slides,
            last_match_started: None,
            last_cycle_time: None,
        }
    }

    /// Time since the current period began; zero when the field is idle.
    fn elapsed(&self, now: Instant) -> Duration {
        self.period_start
            .map_or(Duration::ZERO, |start| now.duration_since(start))
    }

    fn score_mut(&mut self, alliance: AllianceColor) -> &mut RealtimeScore {
        match alliance {
            AllianceColor::Red => &mut self.red_score,
            AllianceColor::Blue => &mut self.blue_score,
        }
    }

    /// Verify every station is ready for the match to start. Stations are
    /// checked in order `R1..B3` and the first failure is reported.
    fn check_ready(&self) -> Result<(), ArenaError> {
        for (id, station) in StationId::ALL.iter().zip(&self.stations) {
            if station.estop {
                return Err(ArenaError::NotReady(format!(
                    "station {id} is emergency stopped"
                )));
            }
            if station.bypass {
                continue;
            }
            if station.team.is_none() {
                return Err(ArenaError::NotReady(format!(
                    "station {id} has no team and is not bypassed"
                )));
            }
            if !station.robot_linked() {
                return Err(ArenaError::NotReady(format!(
                    "station {id} does not have a linked robot"
                )));
            }
        }
        Ok(())
    }

    /// Fire a control packet at every connected driver station.
    fn send_control_packets(&self, elapsed: Duration, timestamp: OffsetDateTime) {
        let flags = self.match_state.control_flags();
        let seconds = seconds_remaining(self.match_state, elapsed, &self.timing);
        let match_number = self.current_match.type_order.min(u32::from(u16::MAX)) as u16;
        for (id, station) in StationId::ALL.iter().zip(&self.stations) {
            let Some(ds) = &station.ds else {
                continue;
            };
            let packet = ControlPacket {
                sequence: ds.next_sequence(),
                auto: flags.auto,
                enabled: flags.enabled && !station.estop && !station.bypass,
                estop: station.estop,
                station: *id,
                match_type: self.current_match.match_type,
                match_number,
                repeat_number: 1,
                timestamp,
                seconds_remaining: seconds,
            };
            ds.send_control(&packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_teams(teams: [u32; 6]) -> ArenaState {
        let mut state = ArenaState::new(EventSettings::default(), Vec::new(), Vec::new());
        for (index, team_id) in teams.into_iter().enumerate() {
            if team_id != 0 {
                state.stations[index].team = Some(Team::new(team_id, ""));
            }
        }
        state
    }

    #[test]
    fn readiness_reports_the_first_failing_station() {
        let mut state = state_with_teams([101, 102, 0, 104, 105, 106]);
        // R1 has a team but no driver station connected.
        let err = state.check_ready().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot start match: station R1 does not have a linked robot"
        );

        state.stations[0].bypass = true;
        state.stations[1].bypass = true;
        // With R1 and R2 bypassed, empty R3 reports next.
        let err = state.check_ready().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot start match: station R3 has no team and is not bypassed"
        );
    }

    #[test]
    fn emergency_stop_blocks_start_even_when_bypassed() {
        let mut state = state_with_teams([0; 6]);
        for station in &mut state.stations {
            station.bypass = true;
        }
        state.stations[4].estop = true;
        let err = state.check_ready().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot start match: station B2 is emergency stopped"
        );
    }

    #[test]
    fn fully_bypassed_field_is_ready() {
        let mut state = state_with_teams([0; 6]);
        for station in &mut state.stations {
            station.bypass = true;
        }
        assert!(state.check_ready().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_zero_when_idle() {
        let state = ArenaState::new(EventSettings::default(), Vec::new(), Vec::new());
        assert_eq!(state.elapsed(Instant::now()), Duration::ZERO);
    }
}
