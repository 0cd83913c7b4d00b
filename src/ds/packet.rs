//! Binary codec for the driver-station wire protocol.
//!
//! All multi-byte integers are big-endian. The arena pushes 22-byte control
//! packets over UDP and receives 36-byte status packets back; the TCP side
//! carries a 5-byte handshake followed by length-prefixed payload packets.

use thiserror::Error;
use time::OffsetDateTime;

use crate::arena::StationId;
use crate::models::MatchType;

/// Size of the UDP control packet sent to each driver station.
pub const CONTROL_PACKET_LEN: usize = 22;
/// Size of the UDP status packet a driver station sends back.
pub const STATUS_PACKET_LEN: usize = 36;
/// Size of the TCP handshake and its reply.
pub const HANDSHAKE_LEN: usize = 5;

/// TCP packet type for the initial team-number handshake.
pub const TCP_TYPE_HANDSHAKE: u8 = 0x18;
/// TCP packet type for the arena's handshake reply.
pub const TCP_TYPE_HANDSHAKE_REPLY: u8 = 0x19;
/// TCP packet type for driver-station keepalives.
pub const TCP_TYPE_KEEPALIVE: u8 = 0x1c;
/// TCP packet type for driver-station status reports.
pub const TCP_TYPE_STATUS: u8 = 0x16;

/// Decode failure for an inbound driver-station packet.
#[derive(Debug, Error)]
pub enum PacketError {
    /// The packet had the wrong length for its type.
    #[error("packet is {actual} bytes, expected {expected}")]
    Length {
        /// Length the packet type requires.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },
    /// The handshake prefix did not match the protocol magic.
    #[error("malformed handshake prefix {0:02x?}")]
    MalformedHandshake([u8; 3]),
}

/// Per-tick robot control message, encoded to [`CONTROL_PACKET_LEN`] bytes.
#[derive(Debug, Clone)]
pub struct ControlPacket {
    /// Sequence number; wraps at 65536.
    pub sequence: u16,
    /// Robot should run autonomous code.
    pub auto: bool,
    /// Robot may move at all.
    pub enabled: bool,
    /// Robot is emergency stopped.
    pub estop: bool,
    /// Station this packet addresses.
    pub station: StationId,
    /// Type of the loaded match.
    pub match_type: MatchType,
    /// Number of the loaded match within its type.
    pub match_number: u16,
    /// Play number; 1 unless the match is a replay.
    pub repeat_number: u8,
    /// Wall-clock time at encode, for driver-station log alignment.
    pub timestamp: OffsetDateTime,
    /// Seconds left in the current match period.
    pub seconds_remaining: u16,
}

impl ControlPacket {
    /// Serialize to the on-wire layout.
    pub fn encode(&self) -> [u8; CONTROL_PACKET_LEN] {
        let mut buf = [0u8; CONTROL_PACKET_LEN];
        buf[0..2].copy_from_slice(&self.sequence.to_be_bytes());
        buf[2] = 0;
        if self.auto {
            buf[3] |= 0x02;
        }
        if self.enabled {
            buf[3] |= 0x04;
        }
        if self.estop {
            buf[3] |= 0x80;
        }
        buf[5] = self.station.code();
        buf[6] = match_type_code(self.match_type);
        buf[7..9].copy_from_slice(&self.match_number.to_be_bytes());
        buf[9] = self.repeat_number;
        buf[10..14].copy_from_slice(&self.timestamp.microsecond().to_be_bytes());
        buf[14] = self.timestamp.second();
        buf[15] = self.timestamp.minute();
        buf[16] = self.timestamp.hour();
        buf[17] = self.timestamp.day();
        buf[18] = u8::from(self.timestamp.month());
        buf[19] = (self.timestamp.year() - 1900).clamp(0, 255) as u8;
        buf[20..22].copy_from_slice(&self.seconds_remaining.to_be_bytes());
        buf
    }
}

fn match_type_code(match_type: MatchType) -> u8 {
    match match_type {
        MatchType::Test => 0,
        MatchType::Practice => 1,
        MatchType::Qualification => 2,
        MatchType::Playoff => 3,
    }
}

/// Link and power report decoded from a driver station's UDP status packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusPacket {
    /// Team number the driver station claims to be.
    pub team_id: u32,
    /// Driver station sees the roboRIO.
    pub rio_linked: bool,
    /// Driver station sees its radio.
    pub radio_linked: bool,
    /// Driver station has an end-to-end robot link.
    pub robot_linked: bool,
    /// Robot battery voltage.
    pub battery_voltage: f64,
    /// Driver-station-to-robot round trip in milliseconds.
    pub trip_time_ms: u8,
    /// Packets the robot missed, as counted by the driver station.
    pub missed_packets: u8,
}

/// Decode a UDP status packet.
pub fn decode_status(buf: &[u8]) -> Result<StatusPacket, PacketError> {
    if buf.len() != STATUS_PACKET_LEN {
        return Err(PacketError::Length {
            expected: STATUS_PACKET_LEN,
            actual: buf.len(),
        });
    }
    Ok(StatusPacket {
        team_id: u32::from(buf[4]) * 256 + u32::from(buf[5]),
        rio_linked: buf[3] & 0x08 != 0,
        radio_linked: buf[3] & 0x10 != 0,
        robot_linked: buf[3] & 0x20 != 0,
        battery_voltage: f64::from(buf[6]) + f64::from(buf[7]) / 256.0,
        trip_time_ms: buf[1] / 2,
        missed_packets: buf[2],
    })
}

/// Decode the 5-byte TCP handshake, returning the claimed team number.
pub fn decode_handshake(buf: &[u8]) -> Result<u32, PacketError> {
    if buf.len() != HANDSHAKE_LEN {
        return Err(PacketError::Length {
            expected: HANDSHAKE_LEN,
            actual: buf.len(),
        });
    }
    if buf[0] != 0 || buf[1] != 3 || buf[2] != TCP_TYPE_HANDSHAKE {
        return Err(PacketError::MalformedHandshake([buf[0], buf[1], buf[2]]));
    }
    Ok(u32::from(buf[3]) * 256 + u32::from(buf[4]))
}

/// Build the handshake reply assigning the connection to `station`.
///
/// `correct_station` is false when the cabling says the driver station is
/// plugged into some other team's port.
pub fn encode_handshake_reply(station: StationId, correct_station: bool) -> [u8; HANDSHAKE_LEN] {
    [
        0,
        3,
        TCP_TYPE_HANDSHAKE_REPLY,
        station.code(),
        if correct_station { 0 } else { 1 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn packet() -> ControlPacket {
        ControlPacket {
            sequence: 0,
            auto: false,
            enabled: false,
            estop: false,
            station: StationId::R1,
            match_type: MatchType::Qualification,
            match_number: 37,
            repeat_number: 1,
            timestamp: datetime!(2026-04-18 14:30:15.250016 UTC),
            seconds_remaining: 0,
        }
    }

    #[test]
    fn control_packet_layout() {
        let buf = ControlPacket {
            sequence: 0x1234,
            auto: true,
            enabled: true,
            station: StationId::B3,
            seconds_remaining: 135,
            ..packet()
        }
        .encode();

        assert_eq!(buf[0..2], [0x12, 0x34]);
        assert_eq!(buf[2], 0);
        assert_eq!(buf[3], 0x06);
        assert_eq!(buf[5], 5);
        assert_eq!(buf[6], 2);
        assert_eq!(buf[7..9], [0, 37]);
        assert_eq!(buf[9], 1);
        assert_eq!(buf[20..22], [0, 135]);
    }

    #[test]
    fn station_codes_span_the_field() {
        assert_eq!(packet().encode()[5], 0);
        let buf = ControlPacket {
            station: StationId::B3,
            ..packet()
        }
        .encode();
        assert_eq!(buf[5], 5);
    }

    #[test]
    fn estop_sets_the_high_bit() {
        let buf = ControlPacket {
            estop: true,
            ..packet()
        }
        .encode();
        assert_eq!(buf[3], 0x80);
    }

    #[test]
    fn match_type_codes() {
        for (match_type, code) in [
            (MatchType::Test, 0),
            (MatchType::Practice, 1),
            (MatchType::Qualification, 2),
            (MatchType::Playoff, 3),
        ] {
            let buf = ControlPacket {
                match_type,
                ..packet()
            }
            .encode();
            assert_eq!(buf[6], code);
        }
    }

    #[test]
    fn timestamp_fields_are_packed_big_endian() {
        let buf = packet().encode();
        assert_eq!(u32::from_be_bytes(buf[10..14].try_into().unwrap()), 250016);
        assert_eq!(buf[14], 15);
        assert_eq!(buf[15], 30);
        assert_eq!(buf[16], 14);
        assert_eq!(buf[17], 18);
        assert_eq!(buf[18], 4);
        assert_eq!(buf[19], 126);
    }

    #[test]
    fn status_packet_round_trip_fields() {
        let mut buf = [0u8; STATUS_PACKET_LEN];
        buf[1] = 28;
        buf[2] = 103;
        buf[3] = 0x38;
        buf[4..6].copy_from_slice(&1503u16.to_be_bytes());
        buf[6] = 12;
        buf[7] = 128;

        let status = decode_status(&buf).unwrap();
        assert_eq!(status.team_id, 1503);
        assert!(status.rio_linked && status.radio_linked && status.robot_linked);
        assert_eq!(status.battery_voltage, 12.5);
        assert_eq!(status.trip_time_ms, 14);
        assert_eq!(status.missed_packets, 103);
    }

    #[test]
    fn status_packet_rejects_short_frames() {
        assert!(matches!(
            decode_status(&[0u8; 20]),
            Err(PacketError::Length { expected: 36, actual: 20 })
        ));
    }

    #[test]
    fn handshake_decodes_team_number() {
        assert_eq!(decode_handshake(&[0, 3, 0x18, 5, 223]).unwrap(), 1503);
        assert!(matches!(
            decode_handshake(&[0, 3, 0x17, 5, 223]),
            Err(PacketError::MalformedHandshake(_))
        ));
    }

    #[test]
    fn handshake_reply_carries_station_and_status() {
        assert_eq!(
            encode_handshake_reply(StationId::B2, true),
            [0, 3, 0x19, 4, 0]
        );
        assert_eq!(
            encode_handshake_reply(StationId::R3, false),
            [0, 3, 0x19, 2, 1]
        );
    }
}
