use std::time::{Duration, Instant};

use playsync_engine::{
    BackendKind, BackendPreference, DatagramTransport, HostEvent, Player, Role, SimulatedPlayer,
    SyncEngine, SyncSettings, Transport,
};

fn settings(role: Role, port: u16) -> SyncSettings {
    SyncSettings {
        role,
        target: Some(format!("127.0.0.1:{port}").parse().unwrap()),
        backend: BackendPreference::Socket,
        show_osd: false,
        ..SyncSettings::default()
    }
}

/// Poll the follower until it has handled `n` messages or two seconds pass.
fn pump(engine: &mut SyncEngine<Transport>, player: &mut SimulatedPlayer, n: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut handled = 0;
    while handled < n && Instant::now() < deadline {
        handled += engine.poll(player);
        std::thread::sleep(Duration::from_millis(5));
    }
    handled
}

#[test]
fn follower_hard_seeks_to_coordinator_heartbeat() {
    let port = 39301;
    let mut follower = SyncEngine::start(&settings(Role::Follower, port)).unwrap();
    let mut coordinator = SyncEngine::start(&settings(Role::Coordinator, port)).unwrap();
    assert_eq!(follower.transport().kind(), BackendKind::Socket);

    let mut leader = SimulatedPlayer::paused_at(120.0);
    let mut local = SimulatedPlayer::paused_at(3.0);

    coordinator.heartbeat(&mut leader);
    assert_eq!(pump(&mut follower, &mut local, 1), 1);

    let t = local.time_pos().unwrap();
    assert!((t - 120.0).abs() < 1e-9, "follower at {t}");
    assert_eq!(local.speed(), 1.0);
}

#[test]
fn follower_mirrors_transport_and_speed_events() {
    let port = 39302;
    let mut follower = SyncEngine::start(&settings(Role::Follower, port)).unwrap();
    let mut coordinator = SyncEngine::start(&settings(Role::Coordinator, port)).unwrap();

    let mut leader = SimulatedPlayer::paused_at(42.0);
    let mut local = SimulatedPlayer::new(0.0);

    coordinator.on_host_event(&mut leader, HostEvent::PauseChanged(true));
    coordinator.on_host_event(&mut leader, HostEvent::SpeedChanged(1.25));
    coordinator.on_host_event(&mut leader, HostEvent::Seeked);
    assert_eq!(pump(&mut follower, &mut local, 3), 3);

    assert!(local.paused());
    assert_eq!(local.speed(), 1.25);
    assert_eq!(local.time_pos(), Some(42.0));
    assert_eq!(
        follower.follower().map(|f| f.state().base_speed),
        Some(1.25)
    );
}

#[test]
fn small_drift_bends_speed_instead_of_seeking() {
    let port = 39303;
    let mut follower = SyncEngine::start(&settings(Role::Follower, port)).unwrap();
    let mut coordinator = SyncEngine::start(&settings(Role::Coordinator, port)).unwrap();

    let mut leader = SimulatedPlayer::paused_at(60.0);
    // Half a second behind.
    let mut local = SimulatedPlayer::paused_at(59.5);

    coordinator.heartbeat(&mut leader);
    assert_eq!(pump(&mut follower, &mut local, 1), 1);

    assert_eq!(local.time_pos(), Some(59.5));
    assert!(local.speed() > 1.0 && local.speed() <= 2.0);
}

#[test]
fn two_followers_share_the_group_port() {
    let port = 39304;
    let mut a = SyncEngine::start(&settings(Role::Follower, port)).unwrap();
    let mut b = SyncEngine::start(&settings(Role::Follower, port));
    let mut coordinator = SyncEngine::start(&settings(Role::Coordinator, port)).unwrap();

    // Loopback unicast is load-balanced between SO_REUSEPORT sockets, so we
    // only require that both could bind and that the group gets the message.
    assert!(b.is_ok());
    let mut leader = SimulatedPlayer::paused_at(10.0);
    coordinator.on_host_event(&mut leader, HostEvent::PauseChanged(true));

    let mut pa = SimulatedPlayer::new(0.0);
    let mut pb = SimulatedPlayer::new(0.0);
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut handled = 0;
    while handled == 0 && Instant::now() < deadline {
        handled += a.poll(&mut pa);
        if let Ok(b) = b.as_mut() {
            handled += b.poll(&mut pb);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(handled >= 1);
}
