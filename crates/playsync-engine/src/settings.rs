//! Resolved engine configuration.
//!
//! Option names match the keys accepted in options files and on the command
//! line, so both sources go through [`SyncSettings::apply_option`].

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

use crate::error::{SettingsError, TransportError};

/// Absolute bounds for any playback speed the engine applies.
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Process role. Fixed for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Role {
    #[strum(to_string = "coordinator", serialize = "master")]
    Coordinator,
    #[strum(to_string = "follower", serialize = "slave")]
    Follower,
}

/// Which transport backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendPreference {
    /// Socket first, relay as fallback.
    #[default]
    Auto,
    Socket,
    #[strum(to_string = "socat", serialize = "relay")]
    Socat,
}

/// Broadcast rendezvous point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAddress {
    pub host: String,
    pub port: u16,
}

impl GroupAddress {
    /// Resolve to the first socket address for the host.
    pub fn resolve(&self) -> Result<SocketAddr, TransportError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(self.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(self.to_string()))
    }
}

impl FromStr for GroupAddress {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SettingsError::BadTarget(s.to_string());
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(bad)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(bad());
        }
        let port: u16 = port.parse().map_err(|_| bad())?;
        if port == 0 {
            return Err(bad());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Piecewise-linear map from `|diff|` (seconds) to a speed correction magnitude.
///
/// The curve starts at `(speed_adjust_threshold, 0)`, passes through each knot
/// and stays flat after the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionCurve {
    knots: Vec<(f64, f64)>,
}

impl CorrectionCurve {
    pub fn new(knots: Vec<(f64, f64)>) -> Result<Self, SettingsError> {
        let curve = Self { knots };
        curve.check()?;
        Ok(curve)
    }

    /// Default knee points: 0.05s -> 0.05, 0.2s -> 0.125, 1.0s -> `max_adjust`.
    /// Knee values above `max_adjust` are capped so the curve never decreases.
    pub fn with_max(max_adjust: f64) -> Self {
        Self {
            knots: vec![
                (0.05, 0.05_f64.min(max_adjust)),
                (0.2, 0.125_f64.min(max_adjust)),
                (1.0, max_adjust),
            ],
        }
    }

    pub fn knots(&self) -> &[(f64, f64)] {
        &self.knots
    }

    /// Correction magnitude for `abs_diff`, with the curve anchored at `(start, 0)`.
    pub fn magnitude(&self, abs_diff: f64, start: f64) -> f64 {
        let mut prev = (start, 0.0);
        for &(x, y) in self.knots.iter().filter(|(x, _)| *x > start) {
            if abs_diff <= x {
                let span = x - prev.0;
                let t = if span > 0.0 {
                    ((abs_diff - prev.0) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                return prev.1 + (y - prev.1) * t;
            }
            prev = (x, y);
        }
        prev.1
    }

    /// Whether some knot past `start` yields a non-zero correction.
    pub fn corrects_beyond(&self, start: f64) -> bool {
        self.knots.iter().any(|&(x, y)| x > start && y > 0.0)
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.knots.is_empty() {
            return Err(SettingsError::Inconsistent(
                "correction curve needs at least one knot".into(),
            ));
        }
        let mut last = (0.0, 0.0);
        for &(x, y) in &self.knots {
            if !x.is_finite() || !y.is_finite() || x <= last.0 || y < last.1 {
                return Err(SettingsError::Inconsistent(format!(
                    "correction curve must increase in |diff| and never decrease in speed (bad knot {x}:{y})"
                )));
            }
            last = (x, y);
        }
        Ok(())
    }
}

impl FromStr for CorrectionCurve {
    type Err = SettingsError;

    /// `x:y,x:y,...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsError::InvalidValue {
            key: "correction_curve".into(),
            value: s.to_string(),
        };
        let knots = s
            .split(',')
            .map(|pair| {
                let (x, y) = pair.split_once(':').ok_or_else(invalid)?;
                let x = x.trim().parse::<f64>().map_err(|_| invalid())?;
                let y = y.trim().parse::<f64>().map_err(|_| invalid())?;
                Ok((x, y))
            })
            .collect::<Result<Vec<_>, SettingsError>>()?;
        Self::new(knots)
    }
}

/// Everything the engine needs, resolved before start.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub role: Role,
    pub target: Option<GroupAddress>,
    pub backend: BackendPreference,
    /// Coordinator heartbeat period.
    pub sync_interval: Duration,
    /// Transport poll period.
    pub poll_interval: Duration,
    pub seek_threshold: f64,
    pub speed_adjust_threshold: f64,
    pub max_speed_adjust: f64,
    pub initial_offset: f64,
    /// Manual offset change per key press.
    pub offset_step: f64,
    pub show_osd: bool,
    /// Explicit curve; `None` derives the default from `max_speed_adjust`.
    pub correction_curve: Option<CorrectionCurve>,
    /// Relay program name or path for the line relay backend.
    pub relay_program: String,
    /// Apply the manual offset to `seek` messages as well as `position`.
    pub apply_offset_on_seek: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            role: Role::Follower,
            target: None,
            backend: BackendPreference::Auto,
            sync_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            seek_threshold: 5.0,
            speed_adjust_threshold: 0.02,
            max_speed_adjust: 0.5,
            initial_offset: 0.0,
            offset_step: 0.005,
            show_osd: true,
            correction_curve: None,
            relay_program: "socat".to_string(),
            apply_offset_on_seek: false,
        }
    }
}

impl SyncSettings {
    /// Names accepted by [`apply_option`](Self::apply_option).
    pub const OPTION_NAMES: &'static [&'static str] = &[
        "role",
        "target",
        "backend",
        "sync_interval",
        "poll_interval",
        "seek_threshold",
        "speed_adjust_threshold",
        "max_speed_adjust",
        "initial_offset",
        "offset_step",
        "show_osd",
        "correction_curve",
        "relay_program",
        "apply_offset_on_seek",
    ];

    /// Set one option from its textual form.
    pub fn apply_option(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let number = || value.parse::<f64>().map_err(|_| invalid());
        let seconds = || {
            let secs = number()?;
            Duration::try_from_secs_f64(secs).map_err(|_| invalid())
        };

        match key {
            "role" => self.role = value.parse().map_err(|_| invalid())?,
            "target" => self.target = Some(value.parse()?),
            "backend" => self.backend = value.parse().map_err(|_| invalid())?,
            "sync_interval" => self.sync_interval = seconds()?,
            "poll_interval" => self.poll_interval = seconds()?,
            "seek_threshold" => self.seek_threshold = number()?,
            "speed_adjust_threshold" => self.speed_adjust_threshold = number()?,
            "max_speed_adjust" => self.max_speed_adjust = number()?,
            "initial_offset" => self.initial_offset = number()?,
            "offset_step" => self.offset_step = number()?,
            "show_osd" => self.show_osd = parse_bool(value).ok_or_else(invalid)?,
            "correction_curve" => self.correction_curve = Some(value.parse()?),
            "relay_program" if !value.is_empty() => self.relay_program = value.to_string(),
            "relay_program" => return Err(invalid()),
            "apply_offset_on_seek" => {
                self.apply_offset_on_seek = parse_bool(value).ok_or_else(invalid)?
            }
            _ => return Err(SettingsError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// The effective correction curve.
    pub fn curve(&self) -> CorrectionCurve {
        self.correction_curve
            .clone()
            .unwrap_or_else(|| CorrectionCurve::with_max(self.max_speed_adjust))
    }

    /// Target address, or the startup error for a missing one.
    pub fn target(&self) -> Result<&GroupAddress, SettingsError> {
        self.target.as_ref().ok_or(SettingsError::MissingTarget)
    }

    /// Check cross-field consistency. Called once before the engine starts.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.target()?;

        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SettingsError::Inconsistent(format!(
                    "{name} must be a positive number, got {v}"
                )))
            }
        };
        positive("seek_threshold", self.seek_threshold)?;
        positive("speed_adjust_threshold", self.speed_adjust_threshold)?;
        positive("max_speed_adjust", self.max_speed_adjust)?;
        positive("offset_step", self.offset_step)?;

        if self.max_speed_adjust > MAX_SPEED - 0.5 {
            return Err(SettingsError::Inconsistent(format!(
                "max_speed_adjust {} exceeds {}",
                self.max_speed_adjust,
                MAX_SPEED - 0.5
            )));
        }
        if self.seek_threshold <= self.speed_adjust_threshold {
            return Err(SettingsError::Inconsistent(format!(
                "seek_threshold ({}) must exceed speed_adjust_threshold ({})",
                self.seek_threshold, self.speed_adjust_threshold
            )));
        }
        if !self.initial_offset.is_finite() {
            return Err(SettingsError::Inconsistent(
                "initial_offset must be finite".into(),
            ));
        }
        if self.sync_interval.is_zero() || self.poll_interval.is_zero() {
            return Err(SettingsError::Inconsistent(
                "sync_interval and poll_interval must be non-zero".into(),
            ));
        }
        let curve = self.curve();
        curve.check()?;
        if !curve.corrects_beyond(self.speed_adjust_threshold) {
            return Err(SettingsError::Inconsistent(format!(
                "correction curve has no positive knot beyond speed_adjust_threshold ({})",
                self.speed_adjust_threshold
            )));
        }
        Ok(())
    }
}

/// mpv script-opts style booleans.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}
