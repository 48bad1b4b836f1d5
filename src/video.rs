use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::errors::{Result, TelloError};

pub const VIDEO_UDP_PORT:u16 = 11111;

/// What a decoder process is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Photo,
    Recording,
    Streaming
}

/// How to run the external decoder, eg ffmpeg.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub program: String,
    pub video_port: u16,
    pub photo_args: Vec<String>,
    pub recording_args: Vec<String>,
    pub streaming_args: Vec<String>,
    /// Pass the decoder's own console output through instead of discarding it.
    pub debug: bool
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            video_port: VIDEO_UDP_PORT,
            photo_args: args(&["-frames:v", "1", "-y"]),
            recording_args: args(&["-c:v", "copy", "-y"]),
            streaming_args: args(&["-f", "sdl2"]),
            debug: false,
        }
    }
}

fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
}

impl DecoderConfig {
    /// Full command line for one capture, without the program itself:
    /// `-i udp://0.0.0.0:<port> [output args] [target]`.
    pub fn command_line(&self, kind: CaptureKind, target: &Path) -> Vec<String> {
        let mut a = vec!["-i".to_string(), format!("udp://0.0.0.0:{}", self.video_port)];
        a.extend(match kind {
            CaptureKind::Photo => self.photo_args.iter().cloned(),
            CaptureKind::Recording => self.recording_args.iter().cloned(),
            CaptureKind::Streaming => self.streaming_args.iter().cloned(),
        });
        a.push(target.to_string_lossy().into_owned());
        a
    }
}

/// A running decoder.
pub trait DecoderProcess: Send + Sync {
    fn is_running(&mut self) -> bool;
    fn kill(&mut self);
}

/// Starts decoder processes.
pub trait DecoderLauncher: Send + Sync {
    fn launch(&mut self, config: &DecoderConfig, kind: CaptureKind, target: &Path) -> Result<Box<dyn DecoderProcess>>;
}

/// Launches the configured decoder as a real child process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl DecoderLauncher for ProcessLauncher {
    fn launch(&mut self, config: &DecoderConfig, kind: CaptureKind, target: &Path) -> Result<Box<dyn DecoderProcess>> {
        let args = config.command_line(kind, target);
        debug!("[Video] {} {:?}", config.program, args);

        let output = || if config.debug { Stdio::inherit() } else { Stdio::null() };
        let child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .spawn()
            .map_err(|source| TelloError::ProcessLaunch { program: config.program.clone(), source })?;

        Ok(Box::new(DecoderChild { child }))
    }
}

#[derive(Debug)]
struct DecoderChild {
    child: Child
}

impl DecoderProcess for DecoderChild {
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        if self.is_running() {
            if let Err(err) = self.child.kill() {
                warn!("[Video] failed to kill decoder {} ({err})", self.child.id());
            }
        }
        // reap it
        let _ = self.child.wait();
    }
}

impl Drop for DecoderChild {
    fn drop(&mut self) {
        self.kill();
    }
}

struct ActiveDecoder {
    kind: CaptureKind,
    process: Box<dyn DecoderProcess>
}

/// Keeps at most one decoder process alive.
///
/// Recording and live view are independent wishes sharing the one process:
/// a recording decoder wins while recording, otherwise a streaming decoder
/// runs while live view is wanted. A photo preempts both.
pub struct VideoSupervisor {
    config: DecoderConfig,
    launcher: Box<dyn DecoderLauncher>,
    active: Option<ActiveDecoder>,
    live_view: bool
}

impl std::fmt::Debug for VideoSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSupervisor")
            .field("config", &self.config)
            .field("active", &self.active.as_ref().map(|a| a.kind))
            .field("live_view", &self.live_view)
            .finish()
    }
}

impl VideoSupervisor {
    pub fn new(config: DecoderConfig, launcher: Box<dyn DecoderLauncher>) -> Self {
        Self { config, launcher, active: None, live_view: false }
    }

    pub fn live_view(&self) -> bool {
        self.live_view
    }

    /// What the current decoder is doing, if it is still running.
    pub fn active_kind(&mut self) -> Option<CaptureKind> {
        let active = self.active.as_mut()?;
        if active.process.is_running() {
            Some(active.kind)
        } else {
            None
        }
    }

    /// Kills whatever is running and starts a decoder for `kind`.
    pub(crate) fn start(&mut self, kind: CaptureKind, target: &Path) -> Result<()> {
        self.stop();
        info!("[Video] START {kind:?} → {}", target.display());
        match self.launcher.launch(&self.config, kind, target) {
            Ok(process) => {
                self.active = Some(ActiveDecoder { kind, process });
                Ok(())
            }
            Err(err) => {
                self.fall_back_to_live_view(kind);
                Err(err)
            }
        }
    }

    // after a failed launch, live view stays wanted only if its decoder runs
    fn fall_back_to_live_view(&mut self, failed: CaptureKind) {
        if !self.live_view {
            return;
        }
        if failed != CaptureKind::Streaming {
            match self.launcher.launch(&self.config, CaptureKind::Streaming, &stream_target()) {
                Ok(process) => {
                    info!("[Video] back to live view");
                    self.active = Some(ActiveDecoder { kind: CaptureKind::Streaming, process });
                    return;
                }
                Err(err) => warn!("[Video] couldn't restore live view ({err})"),
            }
        }
        self.live_view = false;
    }

    pub(crate) fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            info!("[Video] STOP {:?}", active.kind);
            active.process.kill();
        }
    }

    /// Wants live view and shows it, unless a recording decoder is busy.
    pub(crate) fn start_live_view(&mut self) -> Result<()> {
        self.live_view = true;
        if self.active_kind() == Some(CaptureKind::Recording) {
            info!("[Video] recording in progress, live view waits for it");
            return Ok(());
        }
        self.start(CaptureKind::Streaming, &stream_target())
    }

    /// Drops live view, leaving any recording decoder alone.
    pub(crate) fn stop_live_view(&mut self) {
        self.live_view = false;
        if self.active.as_ref().map(|a| a.kind) == Some(CaptureKind::Streaming) {
            self.stop();
        }
    }

    /// Ends a recording (or whatever preempted it), falling back to a bare
    /// streaming decoder if live view is still wanted.
    pub(crate) fn stop_recording(&mut self) -> Result<()> {
        if self.live_view {
            if self.active_kind() == Some(CaptureKind::Streaming) {
                return Ok(());
            }
            return self.start(CaptureKind::Streaming, &stream_target());
        }
        self.stop();
        Ok(())
    }

    pub(crate) fn shutdown(&mut self) {
        self.live_view = false;
        self.stop();
    }

    pub(crate) fn into_parts(mut self) -> (DecoderConfig, Box<dyn DecoderLauncher>) {
        self.shutdown();
        let launcher = std::mem::replace(&mut self.launcher, Box::new(ProcessLauncher));
        (self.config.clone(), launcher)
    }
}

impl Drop for VideoSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

// the streaming arguments carry their own output, this only names the window
fn stream_target() -> PathBuf {
    PathBuf::from("Tello")
}
