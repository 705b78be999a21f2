//! Shared doubles for unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::{
    error::TransportError,
    player::Player,
    transport::{BackendKind, DatagramTransport},
};

/// Player that records every command and reports a fixed time.
#[derive(Debug)]
pub struct FakePlayer {
    pub time: Option<f64>,
    pub paused: bool,
    pub speed: f64,
    pub seeks: Vec<f64>,
    pub speeds: Vec<f64>,
    pub pauses: Vec<bool>,
    pub messages: Vec<String>,
}

impl FakePlayer {
    pub fn at(time: f64) -> Self {
        Self {
            time: Some(time),
            paused: false,
            speed: 1.0,
            seeks: Vec::new(),
            speeds: Vec::new(),
            pauses: Vec::new(),
            messages: Vec::new(),
        }
    }
}

impl Player for FakePlayer {
    fn time_pos(&self) -> Option<f64> {
        self.time
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.pauses.push(paused);
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
        self.speeds.push(speed);
    }

    fn seek_absolute(&mut self, time: f64) {
        self.time = Some(time);
        self.seeks.push(time);
    }

    fn show_message(&mut self, text: &str, _duration: Duration) {
        self.messages.push(text.to_string());
    }
}

/// In-memory transport: `inbound` is what `try_recv` hands out, `sent` collects sends.
#[derive(Debug, Default)]
pub struct FakeTransport {
    pub inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub fail_sends: bool,
}

impl FakeTransport {
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim_end().to_string())
            .collect()
    }
}

impl DatagramTransport for FakeTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Send(std::io::Error::other("unreachable")));
        }
        self.sent.push(payload.to_vec());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.pop_front()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Socket
    }
}
