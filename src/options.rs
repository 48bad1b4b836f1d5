use crate::control::*;
use crate::state::*;
use crate::video::*;

pub const DEFAULT_DRONE_HOST:&str = "192.168.10.1";
pub const DEFAULT_SPEED:f64 = 50.0;

/// Tello drone connection and other usage options.
pub struct TelloOptions {
    pub(crate) drone_address: String,
    pub(crate) state_address: String,
    pub(crate) speed: f64,
    pub(crate) decoder: DecoderConfig,
    pub(crate) launcher: Box<dyn DecoderLauncher>,
    pub(crate) state_sender: Option<TelloStateSender>,
    pub(crate) event_sender: Option<CommandEventSender>
}

impl Default for TelloOptions {
    fn default() -> Self {
        Self {
            drone_address: format!("{DEFAULT_DRONE_HOST}:{CONTROL_UDP_PORT}"),
            state_address: format!("0.0.0.0:{STATE_UDP_PORT}"),
            speed: DEFAULT_SPEED,
            decoder: DecoderConfig::default(),
            launcher: Box::new(ProcessLauncher),
            state_sender: None,
            event_sender: None,
        }
    }
}

impl std::fmt::Debug for TelloOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelloOptions")
            .field("drone_address", &self.drone_address)
            .field("state_address", &self.state_address)
            .field("speed", &self.speed)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

impl TelloOptions {
    /// Where to send commands, "host:port".
    pub fn with_drone_address(mut self, address: impl Into<String>) -> Self {
        self.drone_address = address.into();
        self
    }

    /// Local address to receive state datagrams on, "0.0.0.0:8890" by default.
    pub fn with_state_address(mut self, address: impl Into<String>) -> Self {
        self.state_address = address.into();
        self
    }

    /// Speed in cm/s assumed until the drone says otherwise, clamped to
    /// 10..=100.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.clamp(10.0, 100.0);
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replaces the way decoder processes are started.
    pub fn with_launcher(mut self, launcher: Box<dyn DecoderLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Request a state snapshot for every state datagram from the drone.
    ///
    /// *nb* As messages are sent to the UDP broadcast address 0.0.0.0 this
    /// only works in AP mode, ie using the drone's own WiFi network
    ///
    /// Returns the receiver end of the channel used to pass on updates
    ///
    pub fn with_state(&mut self) -> TelloStateReceiver  {
        let (tx, rx) = make_tello_state_channel();
        self.state_sender = Some(tx);
        rx
    }

    /// Returns the receiver end of a channel reporting every command issued
    /// and completed, eg for a UI showing the traffic.
    ///
    pub fn with_command_events(&mut self) -> CommandEventReceiver {
        let (tx, rx) = make_command_event_channel();
        self.event_sender = Some(tx);
        rx
    }
}
