//! Playback synchronization engine.
//!
//! One coordinator broadcasts its playback state; every follower bends its
//! own playback speed (or seeks, for large gaps) to converge on it.
//!
//! # Architecture
//!
//! - [`transport`]: non-blocking datagram channel with socket and relay backends
//! - [`engine`]: role controller that owns the transport and one role loop
//! - [`coordinator`]: maps local player events to protocol messages
//! - [`follower`]: applies received messages to the local player
//! - [`corrector`]: the speed-shaping / hard-seek decision
//! - [`player`]: the host player interface and a simulated player
//! - [`settings`]: the resolved configuration record

pub mod coordinator;
pub mod corrector;
pub mod engine;
pub mod error;
pub mod follower;
pub mod player;
pub mod settings;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use corrector::{Correction, Corrector};
pub use engine::SyncEngine;
pub use error::{EngineError, SettingsError, TransportError};
pub use player::{HostEvent, Player, SimulatedPlayer};
pub use settings::{BackendPreference, CorrectionCurve, GroupAddress, Role, SyncSettings};
pub use transport::{BackendKind, DatagramTransport, Transport};
