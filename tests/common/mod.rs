//! A fake drone on localhost and a fake decoder launcher.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use tello_console::{
    CaptureKind, Connected, DecoderConfig, DecoderLauncher, DecoderProcess, Result, Tello, TelloError,
    TelloOptions,
};

pub type Responder = fn(&str) -> Option<String>;

/// Answers like a well behaved drone at speed 50. `rc` gets no answer.
pub fn well_behaved(command: &str) -> Option<String> {
    let reply = match command {
        "speed?" => "50.0",
        "battery?" => "87",
        c if c.ends_with('?') => "0",
        c if c.starts_with("rc ") => return None,
        _ => "ok",
    };
    Some(reply.to_string())
}

/// Records every command it receives and answers through a responder.
pub struct FakeDrone {
    address: SocketAddr,
    log: Arc<Mutex<Vec<String>>>,
    sock: Arc<UdpSocket>,
    task: JoinHandle<()>,
}

impl FakeDrone {
    pub async fn start() -> Self {
        Self::with_responder(well_behaved).await
    }

    pub async fn with_responder(responder: Responder) -> Self {
        let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let address = sock.local_addr().unwrap();
        let log = Arc::new(Mutex::new(vec![]));

        let task = {
            let sock = sock.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut buf = vec![0; 1024];
                loop {
                    let Ok((n, from)) = sock.recv_from(&mut buf).await else { continue };
                    let command = String::from_utf8_lossy(&buf[..n]).to_string();
                    log.lock().unwrap().push(command.clone());
                    if let Some(reply) = responder(&command) {
                        let _ = sock.send_to(reply.as_bytes(), from).await;
                    }
                }
            })
        };

        Self { address, log, sock, task }
    }

    pub fn address(&self) -> String {
        self.address.to_string()
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Commands after the connection handshake.
    pub fn commands_after_connect(&self) -> Vec<String> {
        self.commands().into_iter().skip_while(|c| c != "battery?").skip(1).collect()
    }

    /// Waits up to a second for at least `n` commands.
    pub async fn wait_for_commands(&self, n: usize) -> Vec<String> {
        for _ in 0..100 {
            let commands = self.commands();
            if commands.len() >= n {
                return commands;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.commands()
    }

    /// Sends a state datagram, as the drone would.
    pub async fn send_state(&self, message: &str, to: SocketAddr) {
        self.sock.send_to(message.as_bytes(), to).await.unwrap();
    }
}

impl Drop for FakeDrone {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn options_for(drone: &FakeDrone) -> TelloOptions {
    TelloOptions::default()
        .with_drone_address(drone.address())
        .with_state_address("127.0.0.1:0")
}

pub async fn connect(drone: &FakeDrone) -> Tello<Connected> {
    connect_with(options_for(drone)).await
}

pub async fn connect_with(options: TelloOptions) -> Tello<Connected> {
    Tello::with_options(options)
        .skip_wifi_check()
        .connect()
        .await
        .unwrap()
}

#[derive(Debug)]
pub struct Launch {
    pub kind: CaptureKind,
    pub target: PathBuf,
    running: Arc<AtomicBool>,
}

/// Pretends to start decoders, keeping track of which are still "running".
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    launches: Arc<Mutex<Vec<Launch>>>,
    fail: Arc<Mutex<Vec<CaptureKind>>>,
}

impl FakeLauncher {
    pub fn failing() -> Self {
        let launcher = Self::default();
        launcher.fail_on(&[CaptureKind::Photo, CaptureKind::Recording, CaptureKind::Streaming]);
        launcher
    }

    /// From now on, launches of these kinds fail.
    pub fn fail_on(&self, kinds: &[CaptureKind]) {
        *self.fail.lock().unwrap() = kinds.to_vec();
    }

    pub fn launched(&self) -> Vec<(CaptureKind, PathBuf)> {
        self.launches.lock().unwrap().iter().map(|l| (l.kind, l.target.clone())).collect()
    }

    pub fn alive(&self) -> Vec<CaptureKind> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.running.load(Ordering::SeqCst))
            .map(|l| l.kind)
            .collect()
    }
}

struct FakeProcess {
    running: Arc<AtomicBool>,
}

impl DecoderProcess for FakeProcess {
    fn is_running(&mut self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn kill(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl DecoderLauncher for FakeLauncher {
    fn launch(&mut self, config: &DecoderConfig, kind: CaptureKind, target: &Path) -> Result<Box<dyn DecoderProcess>> {
        if self.fail.lock().unwrap().contains(&kind) {
            return Err(TelloError::ProcessLaunch {
                program: config.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no decoder here"),
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        self.launches.lock().unwrap().push(Launch { kind, target: target.to_path_buf(), running: running.clone() });
        Ok(Box::new(FakeProcess { running }))
    }
}
