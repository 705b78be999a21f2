//! Host player interface.
//!
//! The engine never blocks on the player: getters read whatever the host
//! last reported, setters are fire-and-forget.

use std::time::{Duration, Instant};

/// Properties and commands the engine needs from a media player.
pub trait Player {
    /// Current playback position in seconds, `None` when nothing is loaded.
    fn time_pos(&self) -> Option<f64>;
    fn paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);
    fn speed(&self) -> f64;
    fn set_speed(&mut self, speed: f64);
    /// Jump to an absolute position in seconds.
    fn seek_absolute(&mut self, time: f64);
    /// Show a transient on-screen message.
    fn show_message(&mut self, text: &str, duration: Duration);
}

/// Events the host emits towards the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    PauseChanged(bool),
    /// A seek finished; the player's time position is the new one.
    Seeked,
    SpeedChanged(f64),
    /// User asked to shift the manual offset up by one step.
    OffsetIncrease,
    /// User asked to shift the manual offset down by one step.
    OffsetDecrease,
}

/// A wall-clock driven playhead.
///
/// Useful for running a coordinator or follower without a real player, and
/// for driver tests.
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    /// Position at `anchor`.
    base: f64,
    anchor: Instant,
    paused: bool,
    speed: f64,
    last_message: Option<String>,
}

impl SimulatedPlayer {
    pub fn new(start: f64) -> Self {
        Self {
            base: start,
            anchor: Instant::now(),
            paused: false,
            speed: 1.0,
            last_message: None,
        }
    }

    pub fn paused_at(start: f64) -> Self {
        Self {
            paused: true,
            ..Self::new(start)
        }
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    fn position_at(&self, now: Instant) -> f64 {
        if self.paused {
            self.base
        } else {
            self.base + now.duration_since(self.anchor).as_secs_f64() * self.speed
        }
    }

    /// Fold elapsed time into `base` so a property change only affects the future.
    fn rebase(&mut self) {
        let now = Instant::now();
        self.base = self.position_at(now);
        self.anchor = now;
    }
}

impl Player for SimulatedPlayer {
    fn time_pos(&self) -> Option<f64> {
        Some(self.position_at(Instant::now()))
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.rebase();
        self.paused = paused;
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn set_speed(&mut self, speed: f64) {
        self.rebase();
        self.speed = speed;
    }

    fn seek_absolute(&mut self, time: f64) {
        self.base = time.max(0.0);
        self.anchor = Instant::now();
    }

    fn show_message(&mut self, text: &str, _duration: Duration) {
        self.last_message = Some(text.to_string());
    }
}
