use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::Mutex;
use playsync_engine::{HostEvent, Player};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ipc::{PropertyCache, command_line, setup_commands};
use crate::config::OffsetKeys;

/// Capacity of the host event channel towards the driver.
const EVENT_QUEUE: usize = 256;

/// [`Player`] backed by an mpv IPC connection.
///
/// Reads come from the shared property cache; writes update the cache and
/// queue a command for the writer task. Nothing here waits on mpv.
#[derive(Debug, Clone)]
pub struct MpvPlayer {
    cache: Arc<Mutex<PropertyCache>>,
    commands: mpsc::UnboundedSender<String>,
}

impl MpvPlayer {
    fn command(&self, args: Value) {
        if self.commands.send(command_line(args)).is_err() {
            debug!("mpv connection closed, command dropped");
        }
    }
}

impl Player for MpvPlayer {
    fn time_pos(&self) -> Option<f64> {
        self.cache.lock().time_pos_at(Instant::now())
    }

    fn paused(&self) -> bool {
        self.cache.lock().paused()
    }

    fn set_paused(&mut self, paused: bool) {
        self.cache.lock().set_paused(paused, Instant::now());
        self.command(json!(["set_property", "pause", paused]));
    }

    fn speed(&self) -> f64 {
        self.cache.lock().speed()
    }

    fn set_speed(&mut self, speed: f64) {
        self.cache.lock().set_speed(speed, Instant::now());
        self.command(json!(["set_property", "speed", speed]));
    }

    fn seek_absolute(&mut self, time: f64) {
        self.cache.lock().seek_to(time, Instant::now());
        self.command(json!(["seek", time, "absolute+exact"]));
    }

    fn show_message(&mut self, text: &str, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.command(json!(["show-text", text, ms]));
    }
}

/// Connect to mpv's IPC socket.
///
/// Spawns a reader task that keeps the property cache current and forwards
/// host events, and a writer task that drains queued commands. When mpv goes
/// away the event channel closes.
pub async fn connect(
    socket: &Path,
    offset_keys: Option<&OffsetKeys>,
) -> anyhow::Result<(MpvPlayer, mpsc::Receiver<HostEvent>)> {
    let stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("cannot connect to mpv IPC socket {}", socket.display()))?;
    let (read, mut write) = stream.into_split();

    let cache = Arc::new(Mutex::new(PropertyCache::default()));
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<String>();
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);

    tokio::spawn(async move {
        while let Some(line) = cmd_rx.recv().await {
            let mut frame = line.into_bytes();
            frame.push(b'\n');
            if let Err(e) = write.write_all(&frame).await {
                warn!("mpv IPC write failed: {e}");
                break;
            }
        }
    });

    let reader_cache = Arc::clone(&cache);
    tokio::spawn(async move {
        let mut lines = BufReader::new(read).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let event = reader_cache.lock().apply_line(&line, Instant::now());
                    if let Some(event) = event {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => {
                    info!("mpv closed the IPC connection");
                    break;
                }
                Err(e) => {
                    warn!("mpv IPC read failed: {e}");
                    break;
                }
            }
        }
    });

    let keys = offset_keys.map(|k| (k.up.as_str(), k.down.as_str()));
    for line in setup_commands(keys) {
        cmd_tx
            .send(line)
            .context("mpv IPC writer stopped during setup")?;
    }
    info!("Connected to mpv at {}", socket.display());

    Ok((
        MpvPlayer {
            cache,
            commands: cmd_tx,
        },
        event_rx,
    ))
}
