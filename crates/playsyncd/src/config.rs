//! Command line and options-file configuration.
//!
//! Options files use mpv's script-opts format: one `key=value` per line,
//! `#` starts a comment. Command line flags override file values.

use std::path::{Path, PathBuf};

use clap::Parser;
use playsync_engine::{Role, SettingsError, SyncSettings};
use thiserror::Error;
use tracing::Level;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected key=value")]
    Syntax { path: PathBuf, line: usize },

    #[error("{path}:{line}: {source}")]
    Option {
        path: PathBuf,
        line: usize,
        #[source]
        source: SettingsError,
    },

    #[error("{path}:{line}: unknown option {key:?}, expected one of: {known}")]
    UnknownKey {
        path: PathBuf,
        line: usize,
        key: String,
        known: String,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("no player: pass --mpv-socket <path> or --simulate <seconds>")]
    NoPlayer,
}

/// Keep mpv instances in sync over UDP broadcast
#[derive(Parser, Debug)]
#[command(name = "playsyncd")]
#[command(about = "Keeps mpv playback in lockstep across machines", long_about = None)]
pub struct Cli {
    /// Options file (key=value lines, mpv script-opts format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// master (coordinator) or slave (follower)
    #[arg(short, long)]
    pub role: Option<String>,

    /// Group address, e.g. 192.168.1.255:23456
    #[arg(short, long)]
    pub target: Option<String>,

    /// auto, socket or socat
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Coordinator heartbeat interval in seconds
    #[arg(long)]
    pub sync_interval: Option<f64>,

    /// Transport poll interval in seconds
    #[arg(long)]
    pub poll_interval: Option<f64>,

    /// Gap (seconds) beyond which followers seek instead of bending speed
    #[arg(long)]
    pub seek_threshold: Option<f64>,

    /// Gap (seconds) below which followers play at the nominal speed
    #[arg(long)]
    pub speed_adjust_threshold: Option<f64>,

    /// Largest speed change used for correction
    #[arg(long)]
    pub max_speed_adjust: Option<f64>,

    /// Initial manual offset in seconds
    #[arg(long, allow_hyphen_values = true)]
    pub initial_offset: Option<f64>,

    /// Manual offset change per key press, in seconds
    #[arg(long)]
    pub offset_step: Option<f64>,

    /// Show sync reports on the player's OSD (yes/no)
    #[arg(long)]
    pub show_osd: Option<String>,

    /// Correction curve knots, `gap:adjust,...`
    #[arg(long)]
    pub correction_curve: Option<String>,

    /// Relay program for the socat backend
    #[arg(long)]
    pub relay_program: Option<String>,

    /// Also apply the manual offset when following coordinator seeks (yes/no)
    #[arg(long)]
    pub apply_offset_on_seek: Option<String>,

    /// mpv IPC socket (mpv --input-ipc-server=<path>)
    #[arg(long)]
    pub mpv_socket: Option<PathBuf>,

    /// Run against a simulated player starting at this position instead of mpv
    #[arg(long, conflicts_with = "mpv_socket")]
    pub simulate: Option<f64>,

    /// mpv key that raises the manual offset
    #[arg(long)]
    pub offset_up_key: Option<String>,

    /// mpv key that lowers the manual offset
    #[arg(long)]
    pub offset_down_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Level,
}

/// Which player the daemon drives.
#[derive(Debug, Clone, PartialEq)]
pub enum HostPlayer {
    Mpv(PathBuf),
    Simulated { start: f64 },
}

/// mpv key bindings for the follower's offset controls.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetKeys {
    pub up: String,
    pub down: String,
}

impl Default for OffsetKeys {
    fn default() -> Self {
        Self {
            up: "Ctrl+UP".to_string(),
            down: "Ctrl+DOWN".to_string(),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub sync: SyncSettings,
    pub player: HostPlayer,
    pub offset_keys: OffsetKeys,
}

/// Host-side keys understood in options files besides the engine's own.
const HOST_KEYS: &[&str] = &["mpv_socket", "offset_up_key", "offset_down_key"];

#[derive(Debug, Default)]
struct Builder {
    sync: SyncSettings,
    mpv_socket: Option<PathBuf>,
    offset_keys: OffsetKeys,
}

impl Builder {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "mpv_socket" => self.mpv_socket = Some(PathBuf::from(value)),
            "offset_up_key" => self.offset_keys.up = value.to_string(),
            "offset_down_key" => self.offset_keys.down = value.to_string(),
            _ => self.sync.apply_option(key, value)?,
        }
        Ok(())
    }
}

impl Cli {
    /// Merge defaults, the options file and flags, then validate.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut builder = Builder::default();

        if let Some(path) = &self.config {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            for (line, key, value) in parse_options(path, &text)? {
                builder.apply(&key, &value).map_err(|source| match source {
                    SettingsError::UnknownOption(key) => ConfigError::UnknownKey {
                        path: path.clone(),
                        line,
                        key,
                        known: known_keys().collect::<Vec<_>>().join(", "),
                    },
                    source => ConfigError::Option {
                        path: path.clone(),
                        line,
                        source,
                    },
                })?;
            }
        }

        for (key, value) in self.overrides() {
            builder.apply(key, &value)?;
        }

        builder.sync.validate()?;

        let player = match (self.simulate, builder.mpv_socket) {
            (Some(start), _) => HostPlayer::Simulated { start },
            (None, Some(path)) => HostPlayer::Mpv(path),
            (None, None) => return Err(ConfigError::NoPlayer),
        };

        Ok(Config {
            sync: builder.sync,
            player,
            offset_keys: builder.offset_keys,
        })
    }

    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                out.push((key, value));
            }
        };
        let num = |v: Option<f64>| v.map(|v| v.to_string());

        push("role", self.role.clone());
        push("target", self.target.clone());
        push("backend", self.backend.clone());
        push("sync_interval", num(self.sync_interval));
        push("poll_interval", num(self.poll_interval));
        push("seek_threshold", num(self.seek_threshold));
        push("speed_adjust_threshold", num(self.speed_adjust_threshold));
        push("max_speed_adjust", num(self.max_speed_adjust));
        push("initial_offset", num(self.initial_offset));
        push("offset_step", num(self.offset_step));
        push("show_osd", self.show_osd.clone());
        push("correction_curve", self.correction_curve.clone());
        push("relay_program", self.relay_program.clone());
        push("apply_offset_on_seek", self.apply_offset_on_seek.clone());
        push(
            "mpv_socket",
            self.mpv_socket
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        );
        push("offset_up_key", self.offset_up_key.clone());
        push("offset_down_key", self.offset_down_key.clone());
        out
    }
}

impl Config {
    pub fn is_follower(&self) -> bool {
        self.sync.role == Role::Follower
    }
}

/// Split an options file into `(line number, key, value)` triples.
///
/// Unknown keys are left for the caller to reject so the error can point at
/// the line.
pub fn parse_options(path: &Path, text: &str) -> Result<Vec<(usize, String, String)>, ConfigError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
            path: path.to_path_buf(),
            line: idx + 1,
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Syntax {
                path: path.to_path_buf(),
                line: idx + 1,
            });
        }
        out.push((idx + 1, key.to_string(), value.trim().to_string()));
    }
    Ok(out)
}

/// Every key an options file may contain.
fn known_keys() -> impl Iterator<Item = &'static str> {
    SyncSettings::OPTION_NAMES.iter().chain(HOST_KEYS).copied()
}
