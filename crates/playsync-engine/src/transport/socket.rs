//! Native UDP backend.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use playsync_proto::constants::MAX_DATAGRAM;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, warn};

use super::{BackendKind, DatagramTransport};
use crate::{error::TransportError, settings::GroupAddress};

/// Non-blocking UDP socket bound for one role.
///
/// Coordinators bind an ephemeral port and only send. Followers bind the
/// group port so every coordinator datagram lands on them.
#[derive(Debug)]
pub struct SocketTransport {
    socket: UdpSocket,
    dest: SocketAddr,
    buf: Vec<u8>,
}

impl SocketTransport {
    /// Ephemeral send-side socket. Broadcast is enabled unless the group is loopback.
    pub fn sender(target: &GroupAddress) -> Result<Self, TransportError> {
        let dest = target.resolve()?;
        let socket = new_udp_socket(dest)?;
        if wants_broadcast(dest) {
            socket.set_broadcast(true)?;
        }
        socket.bind(&SockAddr::from(SocketAddr::new(unspecified(dest), 0)))?;
        Self::finish(socket, dest)
    }

    /// Socket bound to the group port. Address reuse lets several followers
    /// share one host.
    pub fn listener(target: &GroupAddress) -> Result<Self, TransportError> {
        let dest = target.resolve()?;
        let socket = new_udp_socket(dest)?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;
        if wants_broadcast(dest) {
            socket.set_broadcast(true)?;
        }
        socket.bind(&SockAddr::from(SocketAddr::new(unspecified(dest), dest.port())))?;
        Self::finish(socket, dest)
    }

    /// Local address the socket ended up on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn finish(socket: Socket, dest: SocketAddr) -> Result<Self, TransportError> {
        socket.set_nonblocking(true)?;
        let socket: UdpSocket = socket.into();

        // Read back what we configured; a sandbox that hands out a crippled
        // socket fails here rather than on the first send.
        let local = socket.local_addr()?;
        if wants_broadcast(dest) && !socket.broadcast()? {
            return Err(TransportError::Unavailable {
                backend: BackendKind::Socket,
                reason: "SO_BROADCAST refused".into(),
            });
        }
        debug!("UDP socket bound on {local}, group {dest}");

        Ok(Self {
            socket,
            dest,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }
}

impl DatagramTransport for SocketTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(payload, self.dest)
            .map(|_| ())
            .map_err(TransportError::Send)
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, _from)) => Some(self.buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("UDP receive failed: {e}");
                None
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Socket
    }
}

fn new_udp_socket(dest: SocketAddr) -> io::Result<Socket> {
    Socket::new(Domain::for_address(dest), Type::DGRAM, Some(Protocol::UDP))
}

fn wants_broadcast(dest: SocketAddr) -> bool {
    dest.is_ipv4() && !dest.ip().is_loopback()
}

fn unspecified(dest: SocketAddr) -> IpAddr {
    match dest {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
