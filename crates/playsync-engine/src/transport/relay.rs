//! Line relay backend.
//!
//! Datagrams travel through an external `socat`. Followers keep one
//! long-lived listener whose stdout is pumped into a [`LineBuffer`] by a
//! background thread; coordinators run a one-shot sender per message.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{BackendKind, DatagramTransport, line_buffer::LineBuffer};
use crate::{error::TransportError, settings::GroupAddress};

/// A located, working relay executable.
#[derive(Debug, Clone)]
pub struct RelayProgram {
    path: PathBuf,
}

impl RelayProgram {
    /// Find `program` (a bare name searched on `PATH`, or a path) and check
    /// that it runs.
    pub fn discover(program: &str) -> Result<Self, TransportError> {
        let unavailable = |reason: String| TransportError::Unavailable {
            backend: BackendKind::Relay,
            reason,
        };

        let path = if program.contains(std::path::MAIN_SEPARATOR) {
            Some(PathBuf::from(program)).filter(|p| p.is_file())
        } else {
            find_in_path(program)
        }
        .ok_or_else(|| unavailable(format!("{program} not found")))?;

        let status = Command::new(&path)
            .arg("-V")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
        if !status.success() {
            return Err(unavailable(format!(
                "{} -V exited with {status}",
                path.display()
            )));
        }

        debug!("Relay program found at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawn a listener on `port` that writes every received datagram to stdout.
    pub fn start_listener(&self, port: u16, ipv6: bool) -> io::Result<RelayListener> {
        let family = if ipv6 { "UDP6" } else { "UDP" };
        let mut child = Command::new(&self.path)
            .arg("-u")
            .arg(format!("{family}-RECV:{port},reuseaddr"))
            .arg("STDOUT")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("relay listener has no stdout"))?;
        let buffer = Arc::new(Mutex::new(LineBuffer::new()));
        let reader = spawn_pump(stdout, Arc::clone(&buffer))?;

        info!("Relay listener started on UDP port {port} (pid {})", child.id());
        Ok(RelayListener {
            child,
            buffer,
            _reader: reader,
        })
    }

    /// Send one line to a relay `address` (see [`datagram_address`]) through
    /// a one-shot relay process.
    ///
    /// Returns the child so the caller can reap it later. On a failed write
    /// the child is killed and reaped here.
    pub fn send_line(&self, payload: &[u8], address: &str) -> io::Result<Child> {
        let mut child = Command::new(&self.path)
            .arg("-u")
            .arg("STDIN")
            .arg(address)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Dropping stdin closes the pipe, which makes the relay flush and exit.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(payload),
            None => Ok(()),
        };
        if let Err(e) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        Ok(child)
    }
}

/// socat sender address for `target`.
///
/// IPv6 groups need the `UDP6-DATAGRAM` address type; broadcast only applies
/// to IPv4.
pub fn datagram_address(target: &GroupAddress, ipv6: bool, broadcast: bool) -> String {
    if ipv6 {
        return format!("UDP6-DATAGRAM:{target}");
    }
    let mut address = format!("UDP-DATAGRAM:{target}");
    if broadcast {
        address.push_str(",broadcast");
    }
    address
}

/// Long-lived relay listener and the side buffer its output lands in.
#[derive(Debug)]
pub struct RelayListener {
    child: Child,
    buffer: Arc<Mutex<LineBuffer>>,
    _reader: JoinHandle<()>,
}

impl RelayListener {
    /// Lines appended since the last call, oldest first.
    pub fn poll_new_lines(&self) -> Vec<Vec<u8>> {
        let mut buffer = self.buffer.lock();
        let lines: Vec<_> = std::iter::from_fn(|| buffer.next_line()).collect();
        lines
    }

    fn next_line(&self) -> Option<Vec<u8>> {
        self.buffer.lock().next_line()
    }
}

impl Drop for RelayListener {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Relay listener already gone: {e}");
        }
        let _ = self.child.wait();
    }
}

#[derive(Debug)]
enum Mode {
    Sender {
        address: String,
        in_flight: Vec<Child>,
    },
    Listener(RelayListener),
}

/// Transport backed by a relay program.
#[derive(Debug)]
pub struct RelayTransport {
    program: RelayProgram,
    mode: Mode,
}

impl RelayTransport {
    pub fn sender(program: &str, target: &GroupAddress) -> Result<Self, TransportError> {
        let program = RelayProgram::discover(program)?;
        // An unresolvable host is left to socat; assume an IPv4 broadcast group.
        let (ipv6, broadcast) = match target.resolve() {
            Ok(addr) => (addr.is_ipv6(), addr.is_ipv4() && !addr.ip().is_loopback()),
            Err(_) => (target.host.contains(':'), true),
        };
        Ok(Self {
            program,
            mode: Mode::Sender {
                address: datagram_address(target, ipv6, broadcast),
                in_flight: Vec::new(),
            },
        })
    }

    pub fn listener(program: &str, target: &GroupAddress) -> Result<Self, TransportError> {
        let program = RelayProgram::discover(program)?;
        let ipv6 = match target.resolve() {
            Ok(addr) => addr.is_ipv6(),
            Err(_) => target.host.contains(':'),
        };
        let listener = program.start_listener(target.port, ipv6)?;
        Ok(Self {
            program,
            mode: Mode::Listener(listener),
        })
    }
}

impl DatagramTransport for RelayTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match &mut self.mode {
            Mode::Sender { address, in_flight } => {
                in_flight.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
                let child = self
                    .program
                    .send_line(payload, address)
                    .map_err(TransportError::Send)?;
                in_flight.push(child);
                Ok(())
            }
            Mode::Listener(_) => Err(TransportError::Send(io::Error::new(
                io::ErrorKind::Unsupported,
                "relay listener cannot send",
            ))),
        }
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        match &self.mode {
            Mode::Listener(listener) => listener.next_line(),
            Mode::Sender { .. } => None,
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Relay
    }
}

fn spawn_pump<R>(mut stdout: R, buffer: Arc<Mutex<LineBuffer>>) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("playsync-relay".into())
        .spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match stdout.read(&mut chunk) {
                    Ok(0) => {
                        warn!("Relay listener closed its output");
                        break;
                    }
                    Ok(n) => buffer.lock().append(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Relay listener read failed: {e}");
                        break;
                    }
                }
            }
        })
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
