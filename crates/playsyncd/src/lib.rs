//! Daemon library - host driver extracted for testing.
//!
//! The engine itself never blocks; this crate owns the clock. [`run`] turns
//! the poll interval, the sync interval and host events into calls on a
//! [`SyncEngine`].

use std::time::Duration;

use playsync_engine::{DatagramTransport, HostEvent, Player, SyncEngine, SyncSettings};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod config;
#[cfg(unix)]
pub mod mpv;

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Cancelled,
    HostClosed,
}

fn ticker(period: Duration) -> time::Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Drive `engine` until cancelled or until the host event channel closes.
pub async fn run<P, T>(
    engine: &mut SyncEngine<T>,
    player: &mut P,
    mut events: mpsc::Receiver<HostEvent>,
    settings: &SyncSettings,
    cancel: CancellationToken,
) -> anyhow::Result<Shutdown>
where
    P: Player,
    T: DatagramTransport,
{
    let mut poll = ticker(settings.poll_interval);
    let mut sync = ticker(settings.sync_interval);

    let reason = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break Shutdown::Cancelled,

            event = events.recv() => match event {
                Some(event) => {
                    debug!("Host event {event:?}");
                    engine.on_host_event(&mut *player, event);
                }
                None => break Shutdown::HostClosed,
            },

            _ = poll.tick() => {
                engine.poll(&mut *player);
            }

            _ = sync.tick() => {
                engine.heartbeat(&mut *player);
            }
        }
    };

    info!("Sync engine stopped ({reason:?})");
    Ok(reason)
}
