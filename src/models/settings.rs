use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use time::OffsetDateTime;

/// Durations of the match periods driven by the arena clock.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTiming {
    /// Optional warmup before the autonomous period.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub warmup: Duration,
    /// Autonomous period length.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub auto: Duration,
    /// Pause between the autonomous and teleoperated periods.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub pause: Duration,
    /// Teleoperated period length.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub teleop: Duration,
    /// Remaining teleop time at which the endgame warning sound plays.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub warning_remaining: Duration,
}

impl MatchTiming {
    /// Elapsed time from match start to the end of the autonomous period.
    pub fn auto_end(&self) -> Duration {
        self.warmup + self.auto
    }

    /// Elapsed time from match start to the start of the teleoperated period.
    pub fn teleop_start(&self) -> Duration {
        self.warmup + self.auto + self.pause
    }

    /// Elapsed time from match start to the end of the match.
    pub fn match_end(&self) -> Duration {
        self.warmup + self.auto + self.pause + self.teleop
    }
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            warmup: Duration::ZERO,
            auto: Duration::from_secs(15),
            pause: Duration::from_secs(3),
            teleop: Duration::from_secs(135),
            warning_remaining: Duration::from_secs(30),
        }
    }
}

/// Credentials and endpoint for publishing results to an external scoring site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingConfig {
    /// Base URL of the results API.
    pub base_url: String,
    /// Account identifier sent in the `X-Auth-Id` header.
    pub auth_id: String,
    /// Shared secret used to sign each request.
    pub auth_secret: String,
}

/// Event-wide settings persisted in the store.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSettings {
    /// Event display name.
    pub name: String,
    /// Match period durations.
    pub timing: MatchTiming,
    /// Number of alliances selected for the playoffs.
    pub num_playoff_alliances: u32,
    /// Scheduled start of the first playoff match.
    #[serde(with = "time::serde::rfc3339::option")]
    pub playoff_start: Option<OffsetDateTime>,
    /// Gap between consecutive playoff matches.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub playoff_match_spacing: Duration,
    /// Results-publishing endpoint; disabled when absent.
    pub publishing: Option<PublishingConfig>,
    /// Base URL for fetching playoff lineups; disabled when absent.
    pub lineup_base_url: Option<String>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            name: "Untitled Event".into(),
            timing: MatchTiming::default(),
            num_playoff_alliances: 8,
            playoff_start: None,
            playoff_match_spacing: Duration::from_secs(600),
            publishing: None,
            lineup_base_url: None,
        }
    }
}
