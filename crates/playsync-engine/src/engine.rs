//! Role controller.
//!
//! Owns the transport and exactly one role loop. The host drives it from
//! three entry points, all non-blocking: [`SyncEngine::poll`] on the poll
//! tick, [`SyncEngine::heartbeat`] on the sync timer, and
//! [`SyncEngine::on_host_event`] for player events and key bindings.

use playsync_proto::decode;
use tracing::{info, trace, warn};

use crate::{
    coordinator::CoordinatorLoop,
    error::EngineError,
    follower::FollowerLoop,
    player::{HostEvent, Player},
    settings::{Role, SyncSettings},
    transport::{DatagramTransport, Transport},
};

#[derive(Debug)]
pub enum RoleLoop {
    Coordinator(CoordinatorLoop),
    Follower(FollowerLoop),
}

#[derive(Debug)]
pub struct SyncEngine<T = Transport> {
    transport: T,
    role: RoleLoop,
}

impl SyncEngine<Transport> {
    /// Validate settings, open the transport and build the role loop.
    ///
    /// Any error here is fatal: the engine does not start and the player is
    /// left alone.
    pub fn start(settings: &SyncSettings) -> Result<Self, EngineError> {
        settings.validate()?;
        let transport = Transport::open(settings)?;

        if settings.role == Role::Follower
            && settings.initial_offset != 0.0
            && !settings.apply_offset_on_seek
        {
            warn!(
                "Manual offset {:+.3}s applies to position updates only, not to coordinator seeks",
                settings.initial_offset
            );
        }

        Ok(Self::with_transport(settings, transport))
    }
}

impl<T: DatagramTransport> SyncEngine<T> {
    /// Build an engine around an already opened transport.
    pub fn with_transport(settings: &SyncSettings, transport: T) -> Self {
        let role = match settings.role {
            Role::Coordinator => RoleLoop::Coordinator(CoordinatorLoop::new()),
            Role::Follower => RoleLoop::Follower(FollowerLoop::new(settings)),
        };
        info!("Sync engine running as {}", settings.role);
        Self { transport, role }
    }

    pub fn role(&self) -> Role {
        match self.role {
            RoleLoop::Coordinator(_) => Role::Coordinator,
            RoleLoop::Follower(_) => Role::Follower,
        }
    }

    pub fn follower(&self) -> Option<&FollowerLoop> {
        match &self.role {
            RoleLoop::Follower(f) => Some(f),
            RoleLoop::Coordinator(_) => None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drain every pending datagram and apply it in arrival order.
    ///
    /// Returns the number of messages that decoded successfully.
    pub fn poll(&mut self, player: &mut dyn Player) -> usize {
        let mut handled = 0;
        while let Some(payload) = self.transport.try_recv() {
            let msg = match decode(&payload) {
                Ok(msg) => msg,
                Err(e) => {
                    trace!("Dropping undecodable datagram: {e}");
                    continue;
                }
            };
            trace!("Received {msg}");
            handled += 1;
            match &mut self.role {
                RoleLoop::Coordinator(c) => c.on_message(player, msg),
                RoleLoop::Follower(f) => {
                    f.on_message(player, msg);
                }
            }
        }
        handled
    }

    /// Periodic drift-correction tick. Only coordinators send anything.
    pub fn heartbeat(&mut self, player: &mut dyn Player) {
        if let RoleLoop::Coordinator(c) = &mut self.role {
            c.heartbeat(&mut self.transport, player);
        }
    }

    pub fn on_host_event(&mut self, player: &mut dyn Player, event: HostEvent) {
        match &mut self.role {
            RoleLoop::Coordinator(c) => c.on_host_event(&mut self.transport, player, event),
            RoleLoop::Follower(f) => f.on_host_event(player, event),
        }
    }
}
