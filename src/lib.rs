mod errors;
mod wifi;
mod tello;
mod options;
mod state;
mod control;
mod video;
mod command;
mod config;
mod interpreter;

pub use errors::{TelloError, Result};
pub use tello::{Tello, Session, NoWifi, Disconnected, Connected, CONTROL_TIMEOUT, QUERY_TIMEOUT, TAKE_OFF_TIMEOUT, LAND_TIMEOUT, RAW_TIMEOUT};
pub use options::{TelloOptions, DEFAULT_DRONE_HOST, DEFAULT_SPEED};
pub use state::{TelemetryCache, TelloState, Vector3, TelloStateReceiver, parse_message, STATE_UDP_PORT};
pub use control::{CommandChannel, PendingCommand, CommandReply, CommandFailure, CommandEvent, CommandEventReceiver, classify_reply, CONTROL_UDP_PORT};
pub use video::{VideoSupervisor, CaptureKind, DecoderConfig, DecoderLauncher, DecoderProcess, ProcessLauncher, VIDEO_UDP_PORT};
pub use command::{TelloCommand, Direction, Rotation, travel_timeout, rotation_timeout, rc_channel, DEFAULT_DISTANCE, DEFAULT_ANGLE};
pub use config::{Settings, Config};
pub use interpreter::{Interpreter, Flow};
pub use wifi::wait_for_wifi;
