use std::time::Instant;

use playsync_engine::HostEvent;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{trace, warn};

/// `script-message` names bound to the offset keys.
pub const OFFSET_UP_MESSAGE: &str = "playsync-offset-up";
pub const OFFSET_DOWN_MESSAGE: &str = "playsync-offset-down";

/// Properties observed at connect time, with their observer ids.
pub const OBSERVED: [(u64, &str); 3] = [(1, "pause"), (2, "speed"), (3, "time-pos")];

/// One line from mpv: either a command reply or an event.
#[derive(Debug, Deserialize)]
struct IpcLine {
    event: Option<String>,
    name: Option<String>,
    data: Option<Value>,
    #[serde(default)]
    args: Vec<String>,
    error: Option<String>,
    request_id: Option<u64>,
}

/// Last known player properties.
///
/// Updated from mpv's property-change events and optimistically by our own
/// setters. `time-pos` is extrapolated between updates.
#[derive(Debug, Clone)]
pub struct PropertyCache {
    time_pos: Option<f64>,
    observed_at: Instant,
    paused: bool,
    speed: f64,
    seek_pending: bool,
}

impl Default for PropertyCache {
    fn default() -> Self {
        Self {
            time_pos: None,
            observed_at: Instant::now(),
            paused: false,
            speed: 1.0,
            seek_pending: false,
        }
    }
}

impl PropertyCache {
    pub fn time_pos_at(&self, now: Instant) -> Option<f64> {
        let base = self.time_pos?;
        if self.paused {
            return Some(base);
        }
        let elapsed = now.saturating_duration_since(self.observed_at).as_secs_f64();
        Some(base + elapsed * self.speed)
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        self.rebase(now);
        self.paused = paused;
    }

    pub fn set_speed(&mut self, speed: f64, now: Instant) {
        self.rebase(now);
        self.speed = speed;
    }

    pub fn seek_to(&mut self, time: f64, now: Instant) {
        self.time_pos = Some(time);
        self.observed_at = now;
    }

    fn rebase(&mut self, now: Instant) {
        self.time_pos = self.time_pos_at(now);
        self.observed_at = now;
    }

    /// Fold one IPC line into the cache; returns the host event it represents.
    pub fn apply_line(&mut self, line: &str, now: Instant) -> Option<HostEvent> {
        let msg: IpcLine = match serde_json::from_str(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Unparsable line from mpv ({e}): {line}");
                return None;
            }
        };

        let Some(event) = msg.event.as_deref() else {
            match msg.error.as_deref() {
                Some("success") | None => {}
                Some(err) => warn!("mpv rejected request {:?}: {err}", msg.request_id),
            }
            return None;
        };

        match event {
            "property-change" => self.property_changed(msg.name.as_deref(), msg.data, now),
            "seek" => {
                self.seek_pending = true;
                None
            }
            "playback-restart" if self.seek_pending => {
                self.seek_pending = false;
                Some(HostEvent::Seeked)
            }
            "end-file" | "idle" => {
                self.time_pos = None;
                None
            }
            "client-message" => match msg.args.first().map(String::as_str) {
                Some(OFFSET_UP_MESSAGE) => Some(HostEvent::OffsetIncrease),
                Some(OFFSET_DOWN_MESSAGE) => Some(HostEvent::OffsetDecrease),
                _ => None,
            },
            other => {
                trace!("Ignoring mpv event {other}");
                None
            }
        }
    }

    fn property_changed(
        &mut self,
        name: Option<&str>,
        data: Option<Value>,
        now: Instant,
    ) -> Option<HostEvent> {
        match (name?, data) {
            ("pause", Some(Value::Bool(paused))) => {
                self.set_paused(paused, now);
                Some(HostEvent::PauseChanged(paused))
            }
            ("speed", Some(value)) => {
                let speed = value.as_f64()?;
                self.set_speed(speed, now);
                Some(HostEvent::SpeedChanged(speed))
            }
            ("time-pos", Some(value)) => {
                self.time_pos = value.as_f64();
                self.observed_at = now;
                None
            }
            ("time-pos", None) => {
                self.time_pos = None;
                None
            }
            _ => None,
        }
    }
}

/// Serialize an mpv command array as one IPC line.
pub fn command_line(args: Value) -> String {
    json!({ "command": args }).to_string()
}

/// Commands sent once after connecting.
pub fn setup_commands(offset_keys: Option<(&str, &str)>) -> Vec<String> {
    let mut out: Vec<String> = OBSERVED
        .iter()
        .map(|(id, name)| command_line(json!(["observe_property", id, name])))
        .collect();
    if let Some((up, down)) = offset_keys {
        out.push(command_line(json!([
            "keybind",
            up,
            format!("script-message {OFFSET_UP_MESSAGE}")
        ])));
        out.push(command_line(json!([
            "keybind",
            down,
            format!("script-message {OFFSET_DOWN_MESSAGE}")
        ])));
    }
    out
}
