use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::MatchTiming;

/// Hold time after a timeout expires before the arena returns to `PreMatch`.
pub const POST_TIMEOUT_GRACE: Duration = Duration::from_secs(4);

/// Phase of the loaded match, advanced by the tick loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchState {
    /// No match running; teams may connect and the operator may load.
    #[default]
    PreMatch,
    /// Operator has started the match; resolves on the next tick.
    StartMatch,
    /// Pre-autonomous countdown, robots disabled.
    Warmup,
    /// Autonomous period, robots enabled.
    Auto,
    /// Gap between autonomous and teleoperated, robots disabled.
    Pause,
    /// Teleoperated period, robots enabled.
    Teleop,
    /// Match over; scores are committed from here.
    PostMatch,
    /// Field timeout counting down.
    TimeoutActive,
    /// Timeout elapsed; brief hold before returning to `PreMatch`.
    PostTimeout,
}

/// Robot mode bits derived from the match state, before per-station
/// estop/bypass overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFlags {
    /// Robots should run their autonomous routines.
    pub auto: bool,
    /// Robots may drive at all.
    pub enabled: bool,
}

impl MatchState {
    /// Baseline control flags for this state.
    pub fn control_flags(self) -> ControlFlags {
        match self {
            MatchState::PreMatch | MatchState::StartMatch | MatchState::Warmup => ControlFlags {
                auto: true,
                enabled: false,
            },
            MatchState::Auto => ControlFlags {
                auto: true,
                enabled: true,
            },
            MatchState::Teleop => ControlFlags {
                auto: false,
                enabled: true,
            },
            MatchState::Pause
            | MatchState::PostMatch
            | MatchState::TimeoutActive
            | MatchState::PostTimeout => ControlFlags {
                auto: false,
                enabled: false,
            },
        }
    }

    /// Whether a match is underway, from the start trigger until `PostMatch`.
    pub fn is_match_in_progress(self) -> bool {
        matches!(
            self,
            MatchState::StartMatch
                | MatchState::Warmup
                | MatchState::Auto
                | MatchState::Pause
                | MatchState::Teleop
        )
    }

    /// Whether a field timeout is underway.
    pub fn is_timeout(self) -> bool {
        matches!(self, MatchState::TimeoutActive | MatchState::PostTimeout)
    }
}

/// Compute the state one tick later, given time elapsed since the period
/// started. At most one transition per call; operator-driven transitions
/// (start, abort, reset) are not represented here.
pub fn advance(
    state: MatchState,
    elapsed: Duration,
    timing: &MatchTiming,
    timeout: Duration,
) -> MatchState {
    match state {
        MatchState::StartMatch => {
            if timing.warmup.is_zero() {
                MatchState::Auto
            } else {
                MatchState::Warmup
            }
        }
        MatchState::Warmup if elapsed >= timing.warmup => MatchState::Auto,
        MatchState::Auto if elapsed >= timing.auto_end() => {
            if timing.pause.is_zero() {
                MatchState::Teleop
            } else {
                MatchState::Pause
            }
        }
        MatchState::Pause if elapsed >= timing.teleop_start() => MatchState::Teleop,
        MatchState::Teleop if elapsed >= timing.match_end() => MatchState::PostMatch,
        MatchState::TimeoutActive if elapsed >= timeout => MatchState::PostTimeout,
        MatchState::PostTimeout if elapsed >= timeout + POST_TIMEOUT_GRACE => MatchState::PreMatch,
        other => other,
    }
}

/// Seconds-remaining value carried in the driver-station control packet.
pub fn seconds_remaining(state: MatchState, elapsed: Duration, timing: &MatchTiming) -> u16 {
    let seconds = match state {
        MatchState::PreMatch | MatchState::TimeoutActive | MatchState::PostTimeout => {
            timing.auto.as_secs()
        }
        MatchState::StartMatch | MatchState::Auto => {
            timing.auto.saturating_sub(elapsed).as_secs()
        }
        MatchState::Pause => timing.teleop.as_secs(),
        MatchState::Teleop => timing.match_end().saturating_sub(elapsed).as_secs(),
        MatchState::Warmup | MatchState::PostMatch => 0,
    };
    seconds.min(u64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(warmup: u64, auto: u64, pause: u64, teleop: u64) -> MatchTiming {
        MatchTiming {
            warmup: Duration::from_secs(warmup),
            auto: Duration::from_secs(auto),
            pause: Duration::from_secs(pause),
            teleop: Duration::from_secs(teleop),
            warning_remaining: Duration::from_secs(30),
        }
    }

    fn step(state: MatchState, at_secs: f64, timing: &MatchTiming) -> MatchState {
        advance(state, Duration::from_secs_f64(at_secs), timing, Duration::ZERO)
    }

    #[test]
    fn skips_warmup_and_runs_periods_in_order() {
        let timing = timing(0, 10, 1, 140);

        assert_eq!(step(MatchState::StartMatch, 0.0, &timing), MatchState::Auto);
        assert_eq!(step(MatchState::Auto, 9.99, &timing), MatchState::Auto);
        assert_eq!(step(MatchState::Auto, 10.0, &timing), MatchState::Pause);
        assert_eq!(step(MatchState::Pause, 10.5, &timing), MatchState::Pause);
        assert_eq!(step(MatchState::Pause, 11.0, &timing), MatchState::Teleop);
        assert_eq!(step(MatchState::Teleop, 150.99, &timing), MatchState::Teleop);
        assert_eq!(step(MatchState::Teleop, 151.0, &timing), MatchState::PostMatch);
    }

    #[test]
    fn warmup_runs_when_configured() {
        let timing = timing(3, 15, 3, 135);

        assert_eq!(step(MatchState::StartMatch, 0.0, &timing), MatchState::Warmup);
        assert_eq!(step(MatchState::Warmup, 2.9, &timing), MatchState::Warmup);
        assert_eq!(step(MatchState::Warmup, 3.0, &timing), MatchState::Auto);
        assert_eq!(step(MatchState::Auto, 18.0, &timing), MatchState::Pause);
    }

    #[test]
    fn zero_pause_goes_straight_to_teleop() {
        let timing = timing(0, 15, 0, 135);
        assert_eq!(step(MatchState::Auto, 15.0, &timing), MatchState::Teleop);
    }

    #[test]
    fn terminal_and_idle_states_hold() {
        let timing = timing(0, 15, 3, 135);
        assert_eq!(step(MatchState::PreMatch, 500.0, &timing), MatchState::PreMatch);
        assert_eq!(step(MatchState::PostMatch, 500.0, &timing), MatchState::PostMatch);
    }

    #[test]
    fn timeout_expires_then_returns_to_pre_match() {
        let timing = timing(0, 15, 3, 135);
        let timeout = Duration::from_secs(60);
        let at = |s| Duration::from_secs_f64(s);

        assert_eq!(
            advance(MatchState::TimeoutActive, at(59.9), &timing, timeout),
            MatchState::TimeoutActive
        );
        assert_eq!(
            advance(MatchState::TimeoutActive, at(60.0), &timing, timeout),
            MatchState::PostTimeout
        );
        assert_eq!(
            advance(MatchState::PostTimeout, at(63.9), &timing, timeout),
            MatchState::PostTimeout
        );
        assert_eq!(
            advance(MatchState::PostTimeout, at(64.0), &timing, timeout),
            MatchState::PreMatch
        );
    }

    #[test]
    fn control_flags_follow_period() {
        assert_eq!(
            MatchState::Auto.control_flags(),
            ControlFlags { auto: true, enabled: true }
        );
        assert_eq!(
            MatchState::Teleop.control_flags(),
            ControlFlags { auto: false, enabled: true }
        );
        assert_eq!(
            MatchState::Pause.control_flags(),
            ControlFlags { auto: false, enabled: false }
        );
        assert!(!MatchState::TimeoutActive.control_flags().enabled);
    }

    #[test]
    fn packet_clock_counts_down_per_period() {
        let timing = timing(0, 15, 3, 135);
        let at = |s| Duration::from_secs(s);

        assert_eq!(seconds_remaining(MatchState::PreMatch, at(0), &timing), 15);
        assert_eq!(seconds_remaining(MatchState::TimeoutActive, at(30), &timing), 15);
        assert_eq!(seconds_remaining(MatchState::Auto, at(6), &timing), 9);
        assert_eq!(seconds_remaining(MatchState::Pause, at(16), &timing), 135);
        assert_eq!(seconds_remaining(MatchState::Teleop, at(20), &timing), 133);
        assert_eq!(seconds_remaining(MatchState::Teleop, at(300), &timing), 0);
        assert_eq!(seconds_remaining(MatchState::PostMatch, at(300), &timing), 0);
    }
}
