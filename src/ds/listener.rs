use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, trace, warn};

use super::packet::{
    HANDSHAKE_LEN, TCP_TYPE_KEEPALIVE, TCP_TYPE_STATUS, decode_handshake, decode_status,
    encode_handshake_reply,
};
use super::session::DriverStationSession;
use crate::arena::{SharedArena, StationId};

/// Deadline on every TCP read from a driver station.
const TCP_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Hold time before closing a connection from a team that is not in the
/// current match, to damp reconnect storms.
const UNKNOWN_TEAM_CLOSE_DELAY: Duration = Duration::from_secs(1);

/// Accepts driver-station TCP connections and runs their readers.
pub struct DsTcpListener {
    listener: TcpListener,
}

impl DsTcpListener {
    /// Bind the listener.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening for driver stations");
        Ok(Self { listener })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self, arena: SharedArena) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(arena.clone(), stream, peer));
                }
                Err(err) => {
                    warn!(%err, "failed to accept driver station connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Receives UDP status packets from all driver stations on one socket.
pub struct DsUdpListener {
    socket: UdpSocket,
}

impl DsUdpListener {
    /// Bind the status-packet socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %socket.local_addr()?, "listening for driver station status packets");
        Ok(Self { socket })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Read status packets until the task is dropped.
    pub async fn run(self, arena: SharedArena) {
        let mut buf = [0u8; 64];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!(%err, "driver station status socket read failed");
                    continue;
                }
            };
            match decode_status(&buf[..len]) {
                Ok(status) => match arena.session_for_team(status.team_id) {
                    Some(session) => session.handle_status_packet(&status, Instant::now()),
                    None => {
                        trace!(team = status.team_id, "status packet for team not in match");
                    }
                },
                Err(err) => debug!(%peer, %err, "discarding malformed status packet"),
            }
        }
    }
}

/// Team number encoded in a field-network address, `10.TE.AM.x`.
pub(crate) fn team_id_from_ip(ip: IpAddr) -> Option<u32> {
    match ip {
        IpAddr::V4(v4) => {
            let [_, upper, lower, _] = v4.octets();
            Some(u32::from(upper) * 100 + u32::from(lower))
        }
        IpAddr::V6(_) => None,
    }
}

/// Station the connection's source bench belongs to, when the cabling says
/// the driver station is plugged into another team's port.
///
/// A source address that decodes to an unassigned team carries no signal; only
/// a bench owned by a different team in the match marks the connection as
/// plugged in wrong.
fn misplugged_station(
    team_id: u32,
    source_ip: IpAddr,
    station_of: impl Fn(u32) -> Option<StationId>,
) -> Option<StationId> {
    team_id_from_ip(source_ip)
        .filter(|derived| *derived != team_id)
        .and_then(station_of)
}

async fn handle_connection(arena: SharedArena, mut stream: TcpStream, peer: SocketAddr) {
    let mut handshake = [0u8; HANDSHAKE_LEN];
    if let Err(err) = read_exact_deadline(&mut stream, &mut handshake).await {
        warn!(%peer, %err, "driver station handshake read failed");
        return;
    }
    let team_id = match decode_handshake(&handshake) {
        Ok(team_id) => team_id,
        Err(err) => {
            warn!(%peer, %err, "rejecting driver station");
            return;
        }
    };

    let Some(station) = arena.station_for_team(team_id) else {
        debug!(team = team_id, %peer, "team is not in the current match");
        tokio::time::sleep(UNKNOWN_TEAM_CLOSE_DELAY).await;
        return;
    };

    let wrong_station = misplugged_station(team_id, peer.ip(), |id| arena.station_for_team(id));

    let reply = encode_handshake_reply(station, wrong_station.is_none());
    if let Err(err) = stream.write_all(&reply).await {
        warn!(team = team_id, %peer, %err, "failed to send handshake reply");
        return;
    }

    let udp = match control_socket(peer.ip(), arena.config().ds_udp_send_port).await {
        Ok(udp) => udp,
        Err(err) => {
            warn!(team = team_id, %peer, %err, "failed to open control packet socket");
            return;
        }
    };

    let session = Arc::new(DriverStationSession::new(
        team_id,
        station,
        wrong_station,
        udp,
    ));
    info!(team = team_id, %station, %peer, "driver station connected");

    let reader = tokio::spawn(run_tcp_reader(arena.clone(), Arc::clone(&session), stream));
    arena.register_driver_station(session, reader);
}

async fn control_socket(peer: IpAddr, port: u16) -> io::Result<UdpSocket> {
    let bind_addr: SocketAddr = if peer.is_ipv4() {
        "0.0.0.0:0".parse().map_err(io::Error::other)?
    } else {
        "[::]:0".parse().map_err(io::Error::other)?
    };
    let udp = UdpSocket::bind(bind_addr).await?;
    udp.connect((peer, port)).await?;
    Ok(udp)
}

async fn run_tcp_reader(
    arena: SharedArena,
    session: Arc<DriverStationSession>,
    mut stream: TcpStream,
) {
    match read_packets(&session, &mut stream).await {
        Ok(()) => info!(team = session.team_id(), "driver station disconnected"),
        Err(err) => warn!(team = session.team_id(), %err, "driver station read failed"),
    }
    arena.detach_driver_station(&session);
}

async fn read_packets(
    session: &DriverStationSession,
    stream: &mut TcpStream,
) -> io::Result<()> {
    let mut header = [0u8; 2];
    loop {
        match read_exact_deadline(stream, &mut header).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }
        let len = usize::from(u16::from_be_bytes(header));
        let mut body = vec![0u8; len];
        read_exact_deadline(stream, &mut body).await?;

        match body.first().copied() {
            Some(TCP_TYPE_KEEPALIVE) | None => {}
            Some(TCP_TYPE_STATUS) => session.log_tcp_packet(TCP_TYPE_STATUS),
            Some(other) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown driver station packet type {other:#04x}"),
                ));
            }
        }
    }
}

async fn read_exact_deadline(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<()> {
    match timeout(TCP_READ_TIMEOUT, stream.read_exact(buf)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "driver station read timed out",
        )),
    }
}
