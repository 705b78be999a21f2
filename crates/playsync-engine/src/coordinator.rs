//! Coordinator side: turn local player activity into protocol messages.

use playsync_proto::{Message, encode};
use tracing::{debug, trace, warn};

use crate::{
    player::{HostEvent, Player},
    transport::DatagramTransport,
};

/// Coordinator state. Only the anti-echo guard lives here; the player owns
/// the authoritative playback state.
#[derive(Debug, Default)]
pub struct CoordinatorLoop {
    suppress_feedback: bool,
}

impl CoordinatorLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether host events are currently treated as echoes of an inbound message.
    pub fn is_suppressing(&self) -> bool {
        self.suppress_feedback
    }

    /// React to a local player event.
    pub fn on_host_event<T: DatagramTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        player: &mut dyn Player,
        event: HostEvent,
    ) {
        if self.suppress_feedback {
            trace!("Suppressed echo of {event:?}");
            return;
        }

        let msg = match event {
            HostEvent::PauseChanged(true) => Message::Pause,
            HostEvent::PauseChanged(false) => Message::Play,
            HostEvent::Seeked => match player.time_pos() {
                Some(t) if t.is_finite() => Message::Seek(t.max(0.0)),
                _ => {
                    debug!("Seek observed without a time position, not announcing");
                    return;
                }
            },
            HostEvent::SpeedChanged(speed) if speed.is_finite() && speed > 0.0 => {
                Message::Speed(speed)
            }
            HostEvent::SpeedChanged(speed) => {
                debug!("Ignoring invalid local speed {speed}");
                return;
            }
            HostEvent::OffsetIncrease | HostEvent::OffsetDecrease => {
                debug!("Offset keys only apply to followers");
                return;
            }
        };
        send_message(transport, &msg);
    }

    /// Drift-correction heartbeat. Sent regardless of the anti-echo guard.
    pub fn heartbeat<T: DatagramTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        player: &mut dyn Player,
    ) {
        match player.time_pos() {
            Some(t) if t.is_finite() => send_message(transport, &Message::Position(t.max(0.0))),
            _ => trace!("Nothing playing, heartbeat skipped"),
        }
    }

    /// Apply a message that reached a coordinator anyway.
    ///
    /// Only transport commands are honoured; positions and speeds from
    /// elsewhere never override the authoritative timeline.
    pub fn on_message(&mut self, player: &mut dyn Player, msg: Message) {
        self.suppress_feedback = true;
        self.apply(player, msg);
        self.suppress_feedback = false;
    }

    fn apply(&mut self, player: &mut dyn Player, msg: Message) {
        match msg {
            Message::Play => player.set_paused(false),
            Message::Pause => player.set_paused(true),
            Message::Seek(t) => player.seek_absolute(t),
            Message::Position(_) | Message::Speed(_) => {
                trace!("Coordinator ignores {msg}");
            }
        }
    }
}

/// Fire-and-forget send. Failures are logged; the next heartbeat retries implicitly.
pub(crate) fn send_message<T: DatagramTransport + ?Sized>(transport: &mut T, msg: &Message) {
    match transport.send(&encode(msg)) {
        Ok(()) => debug!("Sent {msg}"),
        Err(e) => warn!("Failed to send {msg}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePlayer, FakeTransport};

    #[test]
    fn pause_and_play_are_announced() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(12.0);

        c.on_host_event(&mut t, &mut p, HostEvent::PauseChanged(true));
        c.on_host_event(&mut t, &mut p, HostEvent::PauseChanged(false));
        assert_eq!(t.sent_lines(), vec!["pause", "play"]);
    }

    #[test]
    fn seek_announces_current_time() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(73.25);

        c.on_host_event(&mut t, &mut p, HostEvent::Seeked);
        assert_eq!(t.sent_lines(), vec!["seek|73.25"]);
    }

    #[test]
    fn seek_without_time_is_not_announced() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(0.0);
        p.time = None;

        c.on_host_event(&mut t, &mut p, HostEvent::Seeked);
        assert!(t.sent.is_empty());
    }

    #[test]
    fn speed_changes_are_announced() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(0.0);

        c.on_host_event(&mut t, &mut p, HostEvent::SpeedChanged(1.25));
        c.on_host_event(&mut t, &mut p, HostEvent::SpeedChanged(0.0));
        assert_eq!(t.sent_lines(), vec!["speed|1.25"]);
    }

    #[test]
    fn heartbeat_sends_position() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(100.5);

        c.heartbeat(&mut t, &mut p);
        assert_eq!(t.sent_lines(), vec!["position|100.5"]);

        p.time = None;
        c.heartbeat(&mut t, &mut p);
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn heartbeat_ignores_the_guard() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport::default();
        let mut p = FakePlayer::at(5.0);

        c.suppress_feedback = true;
        c.on_host_event(&mut t, &mut p, HostEvent::PauseChanged(true));
        c.heartbeat(&mut t, &mut p);
        assert_eq!(t.sent_lines(), vec!["position|5.0"]);
    }

    #[test]
    fn inbound_messages_clear_the_guard() {
        let mut c = CoordinatorLoop::new();
        let mut p = FakePlayer::at(5.0);

        for msg in [
            Message::Pause,
            Message::Play,
            Message::Seek(9.0),
            Message::Position(1.0),
            Message::Speed(1.5),
        ] {
            c.on_message(&mut p, msg);
            assert!(!c.is_suppressing());
        }
        assert_eq!(p.pauses, vec![true, false]);
        assert_eq!(p.seeks, vec![9.0]);
        assert!(p.speeds.is_empty());
    }

    #[test]
    fn send_failures_are_not_fatal() {
        let mut c = CoordinatorLoop::new();
        let mut t = FakeTransport {
            fail_sends: true,
            ..FakeTransport::default()
        };
        let mut p = FakePlayer::at(1.0);

        c.heartbeat(&mut t, &mut p);
        t.fail_sends = false;
        c.heartbeat(&mut t, &mut p);
        assert_eq!(t.sent_lines(), vec!["position|1.0"]);
    }
}
