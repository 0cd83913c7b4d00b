//! Driver-station protocol engine: wire codec, per-station sessions, and the
//! TCP/UDP listeners that feed them.

mod listener;
mod packet;
mod session;

pub use listener::{DsTcpListener, DsUdpListener};
pub use packet::{
    CONTROL_PACKET_LEN, ControlPacket, HANDSHAKE_LEN, PacketError, STATUS_PACKET_LEN,
    StatusPacket, TCP_TYPE_HANDSHAKE, TCP_TYPE_HANDSHAKE_REPLY, TCP_TYPE_KEEPALIVE,
    TCP_TYPE_STATUS, decode_handshake, decode_status, encode_handshake_reply,
};
pub use session::{DriverStationSession, DsPacketLog, DsTelemetry};
