use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::command::{rotation_timeout, travel_timeout, Direction, Rotation};
use crate::control::*;
use crate::errors::{Result, TelloError};
use crate::options::TelloOptions;
use crate::state::{StateListener, TelemetryCache};
use crate::video::{CaptureKind, VideoSupervisor};
use crate::wifi::wait_for_wifi;

pub const CONTROL_TIMEOUT:Duration = Duration::from_secs(5);
pub const QUERY_TIMEOUT:Duration = Duration::from_secs(5);
pub const TAKE_OFF_TIMEOUT:Duration = Duration::from_secs(20);
pub const LAND_TIMEOUT:Duration = Duration::from_secs(20);
/// For commands passed through untouched, which may be anything.
pub const RAW_TIMEOUT:Duration = Duration::from_secs(10);

/// What we know the drone is doing.
///
/// Only changed once the drone has acknowledged the command concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub connected: bool,
    pub flying: bool,
    /// Video transport on (`streamon` acknowledged).
    pub streaming: bool,
    pub recording: bool,
    /// cm/s, 10..=100
    pub speed: f64
}

impl Session {
    fn new(speed: f64) -> Self {
        Self { connected: false, flying: false, streaming: false, recording: false, speed }
    }
}

// states
#[derive(Debug)]
pub struct NoWifi {
    options: TelloOptions
}

#[derive(Debug)]
pub struct Disconnected {
    options: TelloOptions
}

#[derive(Debug)]
pub struct Connected {
    channel: CommandChannel,
    listener: StateListener,
    telemetry: TelemetryCache,
    video: VideoSupervisor,
    // kept to hand back on disconnect
    options: TelloOptions
}

#[derive(Debug)]
pub struct Tello<S = NoWifi> {
    session: Session,
    state: S
}

impl<S> Tello<S> {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Tello<NoWifi> {
    pub fn new() -> Self {
        Self::with_options(TelloOptions::default())
    }

    pub fn with_options(options: TelloOptions) -> Self {
        Self { session: Session::new(options.speed), state: NoWifi { options } }
    }

    /// Waits until this machine has joined a WiFi network whose name starts
    /// with `ssid_prefix`, eg "TELLO", giving up after `limit`.
    pub async fn wait_for_wifi(self, ssid_prefix: &str, limit: Duration) -> Result<Tello<Disconnected>> {
        info!("[Tello] waiting for WiFi...");
        wait_for_wifi(ssid_prefix, limit).await?;
        Ok(self.skip_wifi_check())
    }

    /// For when the network is known to be there already, eg a simulator.
    pub fn skip_wifi_check(self) -> Tello<Disconnected> {
        Tello { session: self.session, state: Disconnected { options: self.state.options } }
    }
}

impl Default for Tello<NoWifi> {
    fn default() -> Self {
        Self::new()
    }
}

impl Tello<Disconnected> {
    /// Puts the drone in command mode and starts listening for its state.
    pub async fn connect(self) -> Result<Tello<Connected>> {
        let mut options = self.state.options;
        let drone_address = options.drone_address.clone();

        info!("[Tello] CONNECT → {drone_address}");
        let channel = CommandChannel::open(&drone_address, options.event_sender.clone()).await?;

        info!("[Tello] putting drone in command mode...");
        let reply = channel.send(&PendingCommand::control("command", CONTROL_TIMEOUT)).await?;
        if !reply.ok {
            return Err(TelloError::Generic { msg: format!("drone at {drone_address} didn't enter command mode ({reply:?})") });
        }

        let telemetry = TelemetryCache::new();
        let listener = StateListener::start_listening(&options.state_address, telemetry.clone(), options.state_sender.clone()).await?;

        let launcher = std::mem::replace(&mut options.launcher, Box::new(crate::video::ProcessLauncher));
        let video = VideoSupervisor::new(options.decoder.clone(), launcher);

        let mut session = self.session;
        session.connected = true;

        let mut drone = Tello { session, state: Connected { channel, listener, telemetry, video, options } };
        drone.read_diagnostics().await;

        info!("[Tello] CONNECTED");
        Ok(drone)
    }
}

impl Tello<Connected> {
    // best effort, a connected drone stays connected whatever happens here
    async fn read_diagnostics(&mut self) {
        match self.speed().await {
            Ok(speed) if (10.0..=100.0).contains(&speed) => {
                info!("[Tello] speed {speed}cm/s");
                self.session.speed = speed;
            }
            Ok(speed) => warn!("[Tello] drone reports odd speed {speed}, keeping {}", self.session.speed),
            Err(err) => warn!("[Tello] couldn't read speed ({err})"),
        }

        match self.battery().await {
            Ok(battery) => info!("[Tello] battery {battery}%"),
            Err(err) => warn!("[Tello] couldn't read battery ({err})"),
        }
    }

    /// Live telemetry, shared with the state listener.
    pub fn telemetry(&self) -> TelemetryCache {
        self.state.telemetry.clone()
    }

    /// Where state datagrams are being received.
    pub fn state_address(&self) -> SocketAddr {
        self.state.listener.local_addr()
    }

    pub fn video(&mut self) -> &mut VideoSupervisor {
        &mut self.state.video
    }

    pub async fn send(&self, command: &PendingCommand) -> Result<CommandReply> {
        self.state.channel.send(command).await
    }

    /// Sends a command expecting "ok".
    pub async fn send_command(&self, msg: &str, timeout: Duration) -> Result<CommandReply> {
        self.send(&PendingCommand::control(msg, timeout)).await
    }

    /// Asks the drone something, eg "battery?". The trailing `?` is optional.
    pub async fn query(&self, name: &str) -> Result<CommandReply> {
        let name = name.trim();
        let msg = if name.ends_with('?') { name.to_string() } else { format!("{name}?") };
        self.send(&PendingCommand::query(msg, QUERY_TIMEOUT)).await
    }

    pub async fn query_value<T: FromStr>(&self, name: &str) -> Result<T> {
        let reply = self.query(name).await?;
        let value = match (reply.ok, reply.reply) {
            (true, Some(value)) => value,
            (_, reply) => return Err(TelloError::Generic { msg: format!("no answer to {name}? ({reply:?})") }),
        };
        value.parse::<T>().map_err(|_| TelloError::ParseError { msg: value })
    }

    /// Battery charge in percent.
    pub async fn battery(&self) -> Result<u8> {
        self.query_value("battery").await
    }

    /// Speed setting in cm/s.
    pub async fn speed(&self) -> Result<f64> {
        self.query_value("speed").await
    }

    pub async fn take_off(&mut self) -> Result<CommandReply> {
        let reply = self.send_command("takeoff", TAKE_OFF_TIMEOUT).await?;
        if reply.ok {
            self.session.flying = true;
        }
        Ok(reply)
    }

    /// Lands, if flying. Landing when already on the ground is not a failure.
    pub async fn land(&mut self) -> Result<CommandReply> {
        let was_flying = self.session.flying;
        let mut reply = self.send_command("land", LAND_TIMEOUT).await?;
        if reply.ok {
            self.session.flying = false;
        }
        else if !was_flying {
            debug!("[Tello] land refused, but wasn't flying anyway");
            reply.ok = true;
            reply.failure = None;
        }
        Ok(reply)
    }

    /// Stops the motors immediately, wherever the drone is.
    pub async fn emergency(&mut self) -> Result<CommandReply> {
        let reply = self.send_command("emergency", CONTROL_TIMEOUT).await;
        self.session.flying = false;
        reply
    }

    pub async fn stream_on(&mut self) -> Result<CommandReply> {
        let reply = self.send_command("streamon", CONTROL_TIMEOUT).await?;
        if reply.ok {
            self.session.streaming = true;
        }
        Ok(reply)
    }

    pub async fn stream_off(&mut self) -> Result<CommandReply> {
        let reply = self.send_command("streamoff", CONTROL_TIMEOUT).await?;
        if reply.ok {
            self.session.streaming = false;
        }
        Ok(reply)
    }

    /// Sets the speed in cm/s, 10..=100.
    pub async fn set_speed(&mut self, speed: u8) -> Result<CommandReply> {
        if !(10..=100).contains(&speed) {
            return Err(TelloError::InvalidCommand { msg: format!("speed {speed}, must be 10..100") });
        }
        let reply = self.send_command(&format!("speed {speed}"), CONTROL_TIMEOUT).await?;
        if reply.ok {
            self.session.speed = speed as f64;
        }
        Ok(reply)
    }

    /// Moves `distance` cm, allowing for the time that takes at the current
    /// speed.
    pub async fn move_by(&self, direction: Direction, distance: u32) -> Result<CommandReply> {
        let timeout = travel_timeout(distance, self.session.speed);
        self.send_command(&format!("{} {distance}", direction.as_str()), timeout).await
    }

    pub async fn move_up(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Up, distance).await
    }

    pub async fn move_down(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Down, distance).await
    }

    pub async fn move_left(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Left, distance).await
    }

    pub async fn move_right(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Right, distance).await
    }

    pub async fn move_forward(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Forward, distance).await
    }

    pub async fn move_back(&self, distance: u32) -> Result<CommandReply> {
        self.move_by(Direction::Back, distance).await
    }

    pub async fn turn(&self, rotation: Rotation, degrees: u32) -> Result<CommandReply> {
        self.send_command(&format!("{} {degrees}", rotation.as_str()), rotation_timeout(degrees)).await
    }

    pub async fn turn_clockwise(&self, degrees: u32) -> Result<CommandReply> {
        self.turn(Rotation::Clockwise, degrees).await
    }

    pub async fn turn_counterclockwise(&self, degrees: u32) -> Result<CommandReply> {
        self.turn(Rotation::CounterClockwise, degrees).await
    }

    /// Sets the four remote control channels, -100..=100 each. Nothing waits
    /// for a reply, these are meant to be sent many times a second.
    pub async fn remote_control(&self, left_right: i8, forwards_backwards: i8, up_down: i8, yaw: i8) -> Result<CommandReply> {
        let msg = format!("rc {left_right} {forwards_backwards} {up_down} {yaw}");
        self.send(&PendingCommand::fire_and_forget(msg)).await
    }

    async fn ensure_video_transport(&mut self) -> Result<()> {
        if self.session.streaming {
            return Ok(());
        }
        let reply = self.stream_on().await?;
        if !reply.ok {
            return Err(TelloError::Generic { msg: format!("drone refused streamon ({reply:?})") });
        }
        Ok(())
    }

    /// Captures a single frame to `target`, preempting any recording or live
    /// view decoder.
    pub async fn take_photo(&mut self, target: &Path) -> Result<()> {
        self.ensure_video_transport().await?;
        if self.session.recording {
            warn!("[Tello] photo interrupts recording");
            self.session.recording = false;
        }
        self.state.video.start(CaptureKind::Photo, target)
    }

    pub async fn start_recording(&mut self, target: &Path) -> Result<()> {
        self.ensure_video_transport().await?;
        self.state.video.start(CaptureKind::Recording, target)?;
        self.session.recording = true;
        Ok(())
    }

    /// Stops recording. Live view, if wanted, carries on in a decoder of its
    /// own.
    pub fn stop_recording(&mut self) -> Result<()> {
        self.session.recording = false;
        self.state.video.stop_recording()
    }

    /// Returns whether now recording.
    pub async fn toggle_recording(&mut self, target: &Path) -> Result<bool> {
        if self.session.recording {
            self.stop_recording()?;
        }
        else {
            self.start_recording(target).await?;
        }
        Ok(self.session.recording)
    }

    pub async fn start_streaming(&mut self) -> Result<()> {
        self.ensure_video_transport().await?;
        self.state.video.start_live_view()
    }

    /// Stops live view. The video transport stays on while recording.
    pub async fn stop_streaming(&mut self) -> Result<()> {
        self.state.video.stop_live_view();
        if !self.session.recording && self.session.streaming {
            let reply = self.stream_off().await?;
            if !reply.ok {
                warn!("[Tello] drone refused streamoff ({reply:?})");
            }
        }
        Ok(())
    }

    /// Returns whether live view is now on.
    pub async fn toggle_streaming(&mut self) -> Result<bool> {
        if self.state.video.live_view() {
            self.stop_streaming().await?;
        }
        else {
            self.start_streaming().await?;
        }
        Ok(self.state.video.live_view())
    }

    /// Lands if flying and turns video off if on, then closes the connection.
    pub async fn disconnect(mut self) -> Result<Tello<Disconnected>> {
        info!("[Tello] DISCONNECT");

        if self.session.flying {
            match self.land().await {
                Ok(reply) if reply.ok => {}
                Ok(reply) => error!("[Tello] land before disconnect failed ({reply:?})"),
                Err(err) => error!("[Tello] land before disconnect failed ({err})"),
            }
        }

        self.state.video.shutdown();
        self.session.recording = false;

        if self.session.streaming {
            match self.stream_off().await {
                Ok(reply) if reply.ok => {}
                Ok(reply) => error!("[Tello] streamoff before disconnect failed ({reply:?})"),
                Err(err) => error!("[Tello] streamoff before disconnect failed ({err})"),
            }
        }

        let Connected { channel, listener, video, mut options, .. } = self.state;
        listener.stop_listening().await?;
        drop(channel);

        let (_, launcher) = video.into_parts();
        options.launcher = launcher;

        let mut session = self.session;
        session.connected = false;
        session.flying = false;
        session.streaming = false;

        info!("[Tello] DISCONNECTED");
        Ok(Tello { session, state: Disconnected { options } })
    }
}
