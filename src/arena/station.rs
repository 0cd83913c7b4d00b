use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ds::DriverStationSession;
use crate::models::Team;

/// One of the six driver-station positions on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StationId {
    /// Red alliance, station 1.
    R1,
    /// Red alliance, station 2.
    R2,
    /// Red alliance, station 3.
    R3,
    /// Blue alliance, station 1.
    B1,
    /// Blue alliance, station 2.
    B2,
    /// Blue alliance, station 3.
    B3,
}

impl StationId {
    /// All stations in wire-code order.
    pub const ALL: [StationId; 6] = [
        StationId::R1,
        StationId::R2,
        StationId::R3,
        StationId::B1,
        StationId::B2,
        StationId::B3,
    ];

    /// Wire code used in driver-station packets: R1=0 through B3=5.
    pub fn code(self) -> u8 {
        self.index() as u8
    }

    /// Position in match team-slot order `R1..B3`.
    pub fn index(self) -> usize {
        match self {
            StationId::R1 => 0,
            StationId::R2 => 1,
            StationId::R3 => 2,
            StationId::B1 => 3,
            StationId::B2 => 4,
            StationId::B3 => 5,
        }
    }

    /// Whether the station belongs to the red alliance.
    pub fn is_red(self) -> bool {
        matches!(self, StationId::R1 | StationId::R2 | StationId::R3)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StationId::R1 => "R1",
            StationId::R2 => "R2",
            StationId::R3 => "R3",
            StationId::B1 => "B1",
            StationId::B2 => "B2",
            StationId::B3 => "B3",
        };
        f.write_str(name)
    }
}

/// Live field-side state of one alliance station.
///
/// Owned by the arena; the driver-station session inside carries its own
/// telemetry and is shared with the socket tasks feeding it.
#[derive(Default)]
pub struct AllianceStation {
    /// Team assigned to this station for the loaded match.
    pub team: Option<Team>,
    /// Operator flag excluding the station from readiness and holding it disabled.
    pub bypass: bool,
    /// Emergency stop; latches for the remainder of the match once set.
    pub estop: bool,
    /// The live driver-station connection, once one has bound to this station.
    pub ds: Option<Arc<DriverStationSession>>,
}

impl AllianceStation {
    /// Create a station occupied by `team`.
    pub fn with_team(team: Option<Team>) -> Self {
        Self {
            team,
            ..Self::default()
        }
    }

    /// Team number assigned here, or 0 for an empty slot.
    pub fn team_id(&self) -> u32 {
        self.team.as_ref().map_or(0, |team| team.id)
    }

    /// Whether the robot in this station currently has a full link chain.
    pub fn robot_linked(&self) -> bool {
        self.ds
            .as_ref()
            .is_some_and(|ds| ds.telemetry().robot_linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_follow_station_order() {
        let codes: Vec<u8> = StationId::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, [0, 1, 2, 3, 4, 5]);
        assert_eq!(StationId::B2.code(), 4);
    }

    #[test]
    fn display_names_are_compact() {
        assert_eq!(StationId::R1.to_string(), "R1");
        assert_eq!(StationId::B3.to_string(), "B3");
    }
}
