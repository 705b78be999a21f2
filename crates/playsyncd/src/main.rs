use std::time::Duration;

use clap::Parser;
use playsync_engine::{HostEvent, Player, SimulatedPlayer, SyncEngine};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use playsyncd::config::{Cli, Config, HostPlayer};
use playsyncd::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return Err(e.into());
        }
    };

    info!("Log level: {}", cli.log_level);

    match config.player.clone() {
        HostPlayer::Simulated { start } => {
            // Nothing produces host events; the sender keeps the channel open.
            let (_events_tx, events) = mpsc::channel::<HostEvent>(1);
            let player = SimulatedPlayer::new(start);
            info!("Driving a simulated player from {start:.3}s");
            drive(&config, player, events).await
        }
        HostPlayer::Mpv(socket) => drive_mpv(&config, &socket).await,
    }
}

#[cfg(unix)]
async fn drive_mpv(config: &Config, socket: &std::path::Path) -> anyhow::Result<()> {
    let keys = config.is_follower().then_some(&config.offset_keys);
    let (player, events) = playsyncd::mpv::connect(socket, keys).await?;
    drive(config, player, events).await
}

#[cfg(not(unix))]
async fn drive_mpv(_config: &Config, socket: &std::path::Path) -> anyhow::Result<()> {
    anyhow::bail!(
        "mpv IPC at {} needs a unix domain socket",
        socket.display()
    )
}

async fn drive<P: Player>(
    config: &Config,
    mut player: P,
    events: mpsc::Receiver<HostEvent>,
) -> anyhow::Result<()> {
    let mut engine = match SyncEngine::start(&config.sync) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Sync engine failed to start: {e}");
            player.show_message(&format!("playsync: {e}"), Duration::from_secs(5));
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            on_signal.cancel();
        }
    });

    run(&mut engine, &mut player, events, &config.sync, cancel).await?;
    Ok(())
}
