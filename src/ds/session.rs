use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::warn;

use super::packet::{ControlPacket, StatusPacket};
use crate::arena::StationId;

/// How long the arena waits for a UDP status packet before declaring the
/// driver station unlinked.
const UDP_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Live link and power readings for one driver station.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsTelemetry {
    /// A status packet has arrived within the liveness window.
    pub ds_linked: bool,
    /// Driver station sees its radio.
    pub radio_linked: bool,
    /// Driver station sees the roboRIO.
    pub rio_linked: bool,
    /// Driver station has an end-to-end robot link.
    pub robot_linked: bool,
    /// Robot battery voltage; 0 when unlinked.
    pub battery_voltage: f64,
    /// Driver-station-to-robot round trip in milliseconds.
    pub trip_time_ms: u8,
    /// Packets missed since the current match started.
    pub missed_packet_count: u8,
}

#[derive(Default)]
struct TelemetryInner {
    current: DsTelemetry,
    missed_raw: u8,
    missed_offset: u8,
    last_packet_at: Option<Instant>,
}

/// One driver station's live connection, paired TCP and UDP.
///
/// Telemetry is written by the UDP ingress task and read by the tick loop;
/// the tick loop is the only writer on the outbound UDP socket.
pub struct DriverStationSession {
    team_id: u32,
    station: StationId,
    wrong_station: Option<StationId>,
    udp: UdpSocket,
    sequence: AtomicU16,
    telemetry: Mutex<TelemetryInner>,
    log: Mutex<Option<DsPacketLog>>,
}

impl DriverStationSession {
    /// Create a session for `team_id` bound to `station`.
    ///
    /// `udp` must already be connected to the driver station's address on the
    /// control-packet port. `wrong_station` records where the team's cabling
    /// actually terminates when it differs from the assignment.
    pub fn new(
        team_id: u32,
        station: StationId,
        wrong_station: Option<StationId>,
        udp: UdpSocket,
    ) -> Self {
        Self {
            team_id,
            station,
            wrong_station,
            udp,
            sequence: AtomicU16::new(0),
            telemetry: Mutex::new(TelemetryInner::default()),
            log: Mutex::new(None),
        }
    }

    /// Team this session authenticated as.
    pub fn team_id(&self) -> u32 {
        self.team_id
    }

    /// Station this session is assigned to.
    pub fn station(&self) -> StationId {
        self.station
    }

    /// Station the driver station is physically plugged into, when it is not
    /// the assigned one.
    pub fn wrong_station(&self) -> Option<StationId> {
        self.wrong_station
    }

    /// Snapshot of the current telemetry.
    pub fn telemetry(&self) -> DsTelemetry {
        self.telemetry_lock().current
    }

    /// Next control-packet sequence number; wraps at 65536.
    pub fn next_sequence(&self) -> u16 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Fire a control packet at the driver station. Loss is tolerated; the
    /// next tick sends a fresh packet.
    pub fn send_control(&self, packet: &ControlPacket) {
        if let Err(err) = self.udp.try_send(&packet.encode()) {
            warn!(team = self.team_id, %err, "failed to send control packet");
        }
    }

    /// Fold an inbound UDP status packet into the telemetry.
    pub fn handle_status_packet(&self, status: &StatusPacket, now: Instant) {
        let mut inner = self.telemetry_lock();
        inner.missed_raw = status.missed_packets;
        inner.current = DsTelemetry {
            ds_linked: true,
            radio_linked: status.radio_linked,
            rio_linked: status.rio_linked,
            robot_linked: status.robot_linked,
            battery_voltage: status.battery_voltage,
            trip_time_ms: status.trip_time_ms,
            missed_packet_count: status.missed_packets.wrapping_sub(inner.missed_offset),
        };
        inner.last_packet_at = Some(now);
    }

    /// Clear link flags and battery if no status packet has arrived within
    /// the liveness window. Called once per tick.
    pub fn check_liveness(&self, now: Instant) {
        let mut inner = self.telemetry_lock();
        let alive = inner
            .last_packet_at
            .is_some_and(|at| now.duration_since(at) <= UDP_LIVENESS_TIMEOUT);
        if !alive {
            inner.current.ds_linked = false;
            inner.current.radio_linked = false;
            inner.current.rio_linked = false;
            inner.current.robot_linked = false;
            inner.current.battery_voltage = 0.0;
        }
    }

    /// Rebase the missed-packet counter so the match reports its own count.
    pub fn capture_missed_packet_offset(&self) {
        let mut inner = self.telemetry_lock();
        inner.missed_offset = inner.missed_raw;
        inner.current.missed_packet_count = 0;
    }

    /// Open the per-team CSV log for the match that is about to start.
    pub fn start_logging(&self, dir: &Path, match_name: &str, started: Instant) {
        match DsPacketLog::create(dir, match_name, self.team_id, started) {
            Ok(log) => *self.log_lock() = Some(log),
            Err(err) => {
                warn!(team = self.team_id, %err, "failed to open driver station log");
            }
        }
    }

    /// Close the CSV log at the end of the match.
    pub fn stop_logging(&self) {
        *self.log_lock() = None;
    }

    /// Record an inbound TCP packet against the running match, if any.
    pub fn log_tcp_packet(&self, packet_type: u8) {
        let telemetry = self.telemetry();
        let mut log = self.log_lock();
        if let Some(log) = log.as_mut() {
            if let Err(err) = log.log_packet(packet_type, &telemetry) {
                warn!(team = self.team_id, %err, "failed to write driver station log");
            }
        }
    }

    fn telemetry_lock(&self) -> MutexGuard<'_, TelemetryInner> {
        self.telemetry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_lock(&self) -> MutexGuard<'_, Option<DsPacketLog>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Append-only CSV of a driver station's traffic during one match.
pub struct DsPacketLog {
    writer: BufWriter<File>,
    started: Instant,
}

impl DsPacketLog {
    /// Create `<dir>/<timestamp>_<match>_<team>.csv` with a header row.
    pub fn create(
        dir: &Path,
        match_name: &str,
        team_id: u32,
        started: Instant,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let stamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year][month][day]T[hour][minute][second]"
            ))
            .map_err(io::Error::other)?;
        let file = File::create(dir.join(format!("{stamp}_{match_name}_{team_id}.csv")))?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "match_time_sec,packet_type,ds_linked,radio_linked,rio_linked,robot_linked,\
             battery_voltage,missed_packet_count,trip_time_ms"
        )?;
        Ok(Self { writer, started })
    }

    /// Append one packet observation.
    pub fn log_packet(&mut self, packet_type: u8, telemetry: &DsTelemetry) -> io::Result<()> {
        writeln!(
            self.writer,
            "{:.3},{},{},{},{},{},{:.2},{},{}",
            self.started.elapsed().as_secs_f64(),
            packet_type,
            telemetry.ds_linked,
            telemetry.radio_linked,
            telemetry.rio_linked,
            telemetry.robot_linked,
            telemetry.battery_voltage,
            telemetry.missed_packet_count,
            telemetry.trip_time_ms,
        )?;
        self.writer.flush()
    }
}

impl std::fmt::Debug for DriverStationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverStationSession")
            .field("team_id", &self.team_id)
            .field("station", &self.station)
            .field("wrong_station", &self.wrong_station)
            .finish_non_exhaustive()
    }
}
