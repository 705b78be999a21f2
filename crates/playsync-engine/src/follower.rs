//! Follower side: apply coordinator messages to the local player.
//!
//! `position` snapshots go through the [`Corrector`]; everything else is
//! applied directly. Each message is handled with the anti-echo guard set,
//! and the guard is cleared on every exit path.

use std::time::Duration;

use playsync_proto::Message;
use tracing::{debug, info, trace};

use crate::{
    corrector::{Correction, Corrector},
    player::{HostEvent, Player},
    settings::{MAX_SPEED, MIN_SPEED, SyncSettings},
};

/// How long sync reports stay on screen.
const OSD_DURATION: Duration = Duration::from_millis(1500);

/// Mutable follower state. Only the follower loop touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowerState {
    /// Coordinator's last announced nominal speed.
    pub base_speed: f64,
    /// User-tuned offset added to every position target, in seconds.
    pub manual_offset: f64,
    pub last_known_position: Option<f64>,
    suppress_feedback: bool,
}

impl FollowerState {
    fn new(initial_offset: f64) -> Self {
        Self {
            base_speed: 1.0,
            manual_offset: initial_offset,
            last_known_position: None,
            suppress_feedback: false,
        }
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_feedback
    }
}

#[derive(Debug)]
pub struct FollowerLoop {
    state: FollowerState,
    corrector: Corrector,
    offset_step: f64,
    apply_offset_on_seek: bool,
    show_osd: bool,
}

impl FollowerLoop {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            state: FollowerState::new(settings.initial_offset),
            corrector: Corrector::new(settings),
            offset_step: settings.offset_step,
            apply_offset_on_seek: settings.apply_offset_on_seek,
            show_osd: settings.show_osd,
        }
    }

    pub fn state(&self) -> &FollowerState {
        &self.state
    }

    /// Handle one decoded message. Returns the correction for `position` messages.
    pub fn on_message(&mut self, player: &mut dyn Player, msg: Message) -> Option<Correction> {
        self.state.suppress_feedback = true;
        let correction = self.apply(player, msg);
        self.state.suppress_feedback = false;
        correction
    }

    /// Key bindings and other host events. Followers only care about offset keys.
    pub fn on_host_event(&mut self, player: &mut dyn Player, event: HostEvent) {
        let delta = match event {
            HostEvent::OffsetIncrease => self.offset_step,
            HostEvent::OffsetDecrease => -self.offset_step,
            other => {
                trace!("Follower ignores host event {other:?}");
                return;
            }
        };
        self.state.manual_offset += delta;
        info!("Manual offset now {:+.3}s", self.state.manual_offset);
        self.osd(
            player,
            &format!("sync offset: {:+.3}s", self.state.manual_offset),
        );
    }

    fn apply(&mut self, player: &mut dyn Player, msg: Message) -> Option<Correction> {
        match msg {
            Message::Play => player.set_paused(false),
            Message::Pause => player.set_paused(true),
            Message::Seek(t) => {
                self.state.last_known_position = Some(t);
                // Unlike `position`, `seek` lands on the coordinator's time
                // exactly unless the offset is opted in.
                let target = if self.apply_offset_on_seek {
                    t + self.state.manual_offset
                } else {
                    t
                };
                debug!("Coordinator seeked, following to {target:.3}");
                player.seek_absolute(target.max(0.0));
            }
            Message::Speed(s) => {
                let speed = s.clamp(MIN_SPEED, MAX_SPEED);
                self.state.base_speed = speed;
                debug!("Coordinator speed {speed}");
                player.set_speed(speed);
            }
            Message::Position(t) => return self.correct(player, t),
        }
        None
    }

    fn correct(&mut self, player: &mut dyn Player, coordinator_time: f64) -> Option<Correction> {
        let Some(current) = player.time_pos().filter(|c| c.is_finite()) else {
            trace!("No local time position, skipping correction");
            return None;
        };
        self.state.last_known_position = Some(coordinator_time);

        let offset = self.state.manual_offset;
        let target = coordinator_time + offset;
        let diff = target - current;
        let correction = self.corrector.correct(target, current, self.state.base_speed);

        match correction {
            Correction::HardSeek { target } => {
                info!("Hard seek to {target:.3} (diff {diff:+.3}s, offset {offset:+.3}s)");
                player.seek_absolute(target.max(0.0));
                self.osd(
                    player,
                    &format!("sync: seek to {target:.2} (diff {diff:+.2}s, offset {offset:+.3}s)"),
                );
            }
            Correction::InSync { speed } | Correction::Adjust { speed } => {
                let changed = (player.speed() - speed).abs() > f64::EPSILON;
                debug!("diff {diff:+.3}s, speed {speed:.3}, offset {offset:+.3}s");
                player.set_speed(speed);
                if changed && matches!(correction, Correction::Adjust { .. }) {
                    self.osd(
                        player,
                        &format!("sync: diff {diff:+.3}s speed {speed:.3} offset {offset:+.3}s"),
                    );
                }
            }
        }
        Some(correction)
    }

    fn osd(&self, player: &mut dyn Player, text: &str) {
        if self.show_osd {
            player.show_message(text, OSD_DURATION);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePlayer;

    fn follower() -> FollowerLoop {
        FollowerLoop::new(&SyncSettings::default())
    }

    fn follower_with_offset(offset: f64) -> FollowerLoop {
        FollowerLoop::new(&SyncSettings {
            initial_offset: offset,
            ..SyncSettings::default()
        })
    }

    #[test]
    fn play_and_pause_apply_directly() {
        let mut f = follower();
        let mut p = FakePlayer::at(1.0);
        f.on_message(&mut p, Message::Pause);
        f.on_message(&mut p, Message::Play);
        assert_eq!(p.pauses, vec![true, false]);
        assert!(!f.state().is_suppressing());
    }

    #[test]
    fn seek_ignores_manual_offset() {
        let mut f = follower_with_offset(0.02);
        let mut p = FakePlayer::at(3.0);
        f.on_message(&mut p, Message::Seek(100.0));
        assert_eq!(p.seeks, vec![100.0]);
        assert_eq!(f.state().last_known_position, Some(100.0));
    }

    #[test]
    fn seek_can_opt_into_offset() {
        let mut f = FollowerLoop::new(&SyncSettings {
            initial_offset: 0.5,
            apply_offset_on_seek: true,
            ..SyncSettings::default()
        });
        let mut p = FakePlayer::at(3.0);
        f.on_message(&mut p, Message::Seek(100.0));
        assert_eq!(p.seeks, vec![100.5]);
    }

    #[test]
    fn position_target_includes_offset() {
        let mut f = follower_with_offset(0.02);
        // Local time far away so the hard seek reveals the target.
        let mut p = FakePlayer::at(0.0);
        let c = f.on_message(&mut p, Message::Position(100.0));
        assert_eq!(c, Some(Correction::HardSeek { target: 100.0 + 0.02 }));
        assert_eq!(p.seeks.len(), 1);
        assert!((p.seeks[0] - 100.02).abs() < 1e-9);
        assert!(p.speeds.is_empty());
    }

    #[test]
    fn ahead_follower_slows_down() {
        let mut f = follower();
        let mut p = FakePlayer::at(10.5);
        let c = f.on_message(&mut p, Message::Position(10.0));
        let Some(Correction::Adjust { speed }) = c else {
            panic!("expected adjustment, got {c:?}");
        };
        assert!(speed < 1.0 && speed >= MIN_SPEED);
        assert_eq!(p.speeds, vec![speed]);
        assert!(p.seeks.is_empty());
    }

    #[test]
    fn far_behind_follower_hard_seeks() {
        let mut f = follower();
        let mut p = FakePlayer::at(3.0);
        let c = f.on_message(&mut p, Message::Position(10.0));
        assert_eq!(c, Some(Correction::HardSeek { target: 10.0 }));
        assert_eq!(p.seeks, vec![10.0]);
        assert_eq!(p.speed, 1.0);
        assert!(p.speeds.is_empty());
        assert_eq!(p.messages.len(), 1);
    }

    #[test]
    fn in_sync_restores_base_speed() {
        let mut f = follower();
        let mut p = FakePlayer::at(20.0);
        p.speed = 1.2;
        let c = f.on_message(&mut p, Message::Position(20.01));
        assert_eq!(c, Some(Correction::InSync { speed: 1.0 }));
        assert_eq!(p.speed, 1.0);
    }

    #[test]
    fn offset_keys_shift_next_target() {
        let mut f = follower();
        let mut p = FakePlayer::at(0.0);
        for _ in 0..3 {
            f.on_host_event(&mut p, HostEvent::OffsetIncrease);
        }
        assert!((f.state().manual_offset - 0.015).abs() < 1e-12);

        let mut f = follower_with_offset(0.015);
        for _ in 0..3 {
            f.on_host_event(&mut p, HostEvent::OffsetIncrease);
        }
        assert!((f.state().manual_offset - 0.03).abs() < 1e-12);

        let c = f.on_message(&mut p, Message::Position(50.0));
        let Some(Correction::HardSeek { target }) = c else {
            panic!("expected hard seek, got {c:?}");
        };
        assert!((target - 50.03).abs() < 1e-9);

        f.on_host_event(&mut p, HostEvent::OffsetDecrease);
        assert!((f.state().manual_offset - 0.025).abs() < 1e-12);
    }

    #[test]
    fn offset_reports_reach_the_screen() {
        let mut f = follower();
        let mut p = FakePlayer::at(0.0);
        f.on_host_event(&mut p, HostEvent::OffsetDecrease);
        assert_eq!(p.messages, vec!["sync offset: -0.005s"]);
    }

    #[test]
    fn osd_can_be_disabled() {
        let mut f = FollowerLoop::new(&SyncSettings {
            show_osd: false,
            ..SyncSettings::default()
        });
        let mut p = FakePlayer::at(0.0);
        f.on_host_event(&mut p, HostEvent::OffsetIncrease);
        f.on_message(&mut p, Message::Position(30.0));
        assert!(p.messages.is_empty());
    }

    #[test]
    fn speed_messages_set_base_speed_verbatim() {
        let mut f = follower();
        let mut p = FakePlayer::at(0.0);
        f.on_message(&mut p, Message::Speed(1.0));
        f.on_message(&mut p, Message::Speed(1.25));
        assert_eq!(f.state().base_speed, 1.25);
        assert_eq!(p.speeds, vec![1.0, 1.25]);
    }

    #[test]
    fn speed_messages_are_clamped() {
        let mut f = follower();
        let mut p = FakePlayer::at(0.0);
        f.on_message(&mut p, Message::Speed(4.0));
        assert_eq!(f.state().base_speed, MAX_SPEED);
    }

    #[test]
    fn missing_local_time_skips_correction() {
        let mut f = follower();
        let mut p = FakePlayer::at(0.0);
        p.time = None;
        assert_eq!(f.on_message(&mut p, Message::Position(10.0)), None);
        assert!(p.seeks.is_empty() && p.speeds.is_empty());
        assert!(!f.state().is_suppressing());
    }

    #[test]
    fn repeated_snapshot_repeats_the_action() {
        let mut f = follower();
        let mut p = FakePlayer::at(49.8);
        let first = f.on_message(&mut p, Message::Position(50.0));
        let second = f.on_message(&mut p, Message::Position(50.0));
        assert_eq!(first, second);
        assert_eq!(p.speeds.len(), 2);
        assert_eq!(p.speeds[0], p.speeds[1]);
    }

    #[test]
    fn corrections_use_latest_base_speed() {
        let mut f = follower();
        let mut p = FakePlayer::at(10.0);
        f.on_message(&mut p, Message::Speed(1.5));
        let c = f.on_message(&mut p, Message::Position(10.005));
        assert_eq!(c, Some(Correction::InSync { speed: 1.5 }));
    }
}
