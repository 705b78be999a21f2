//! Datagram transports.
//!
//! Two backends satisfy the same contract: a native UDP socket, and a line
//! relay that pumps datagrams through an external `socat` process. One of
//! them is chosen at startup and kept for the life of the engine.
//!
//! Receiving is always polled: [`DatagramTransport::try_recv`] never blocks.

pub mod line_buffer;
pub mod relay;
pub mod socket;

use strum::Display;
use tracing::{info, warn};

use crate::{
    error::TransportError,
    settings::{BackendPreference, GroupAddress, Role, SyncSettings},
};

pub use relay::RelayTransport;
pub use socket::SocketTransport;

/// Concrete backend behind a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    Socket,
    Relay,
}

/// Best-effort, unordered datagram channel bound to one group.
pub trait DatagramTransport {
    /// Send one payload to the group. Never retried.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Next pending payload, or `None` if nothing is waiting.
    fn try_recv(&mut self) -> Option<Vec<u8>>;

    fn kind(&self) -> BackendKind;
}

/// The transport chosen at startup.
#[derive(Debug)]
pub enum Transport {
    Socket(SocketTransport),
    Relay(RelayTransport),
}

impl Transport {
    /// Open the transport for `role` according to the backend preference.
    ///
    /// A named backend is used alone; `auto` tries the socket first and falls
    /// back to the relay.
    pub fn open(settings: &SyncSettings) -> Result<Self, TransportError> {
        let target = settings
            .target
            .as_ref()
            .ok_or_else(|| TransportError::NoBackend("no target address".into()))?;
        let role = settings.role;

        let transport = match settings.backend {
            BackendPreference::Socket => Self::open_socket(role, target)?,
            BackendPreference::Socat => Self::open_relay(role, target, &settings.relay_program)?,
            BackendPreference::Auto => match Self::open_socket(role, target) {
                Ok(t) => t,
                Err(socket_err) => {
                    warn!("Socket backend unavailable ({socket_err}), trying relay");
                    Self::open_relay(role, target, &settings.relay_program).map_err(
                        |relay_err| {
                            TransportError::NoBackend(format!("{socket_err}; {relay_err}"))
                        },
                    )?
                }
            },
        };

        info!("Using {} transport for {role} on {target}", transport.kind());
        Ok(transport)
    }

    fn open_socket(role: Role, target: &GroupAddress) -> Result<Self, TransportError> {
        let socket = match role {
            Role::Coordinator => SocketTransport::sender(target),
            Role::Follower => SocketTransport::listener(target),
        };
        socket
            .map(Transport::Socket)
            .map_err(|e| TransportError::Unavailable {
                backend: BackendKind::Socket,
                reason: e.to_string(),
            })
    }

    fn open_relay(
        role: Role,
        target: &GroupAddress,
        program: &str,
    ) -> Result<Self, TransportError> {
        let relay = match role {
            Role::Coordinator => RelayTransport::sender(program, target),
            Role::Follower => RelayTransport::listener(program, target),
        };
        relay
            .map(Transport::Relay)
            .map_err(|e| TransportError::Unavailable {
                backend: BackendKind::Relay,
                reason: e.to_string(),
            })
    }
}

impl DatagramTransport for Transport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Socket(t) => t.send(payload),
            Transport::Relay(t) => t.send(payload),
        }
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        match self {
            Transport::Socket(t) => t.try_recv(),
            Transport::Relay(t) => t.try_recv(),
        }
    }

    fn kind(&self) -> BackendKind {
        match self {
            Transport::Socket(t) => t.kind(),
            Transport::Relay(t) => t.kind(),
        }
    }
}
