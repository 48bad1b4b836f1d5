use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::errors::{Result, TelloError};

pub const CONTROL_UDP_PORT:u16 = 8889;

const MAX_REPLY_SIZE:usize = 256;

/// Replies meaning the drone has given up on flying by itself.
const FATAL_REPLIES:[&str; 2] = ["error auto land", "error motor stop"];
const UNKNOWN_COMMAND_REPLY:&str = "unknown command";

/// One command on its way to the drone.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub message: String,
    /// Reply meaning success, compared case-insensitively. `None` accepts any
    /// reply, eg for `battery?`.
    pub expected_reply: Option<String>,
    /// `None` sends without waiting for any reply.
    pub timeout: Option<Duration>
}

impl PendingCommand {
    /// A control command expecting "ok".
    pub fn control(message: impl Into<String>, timeout: Duration) -> Self {
        Self { message: message.into(), expected_reply: Some("ok".to_string()), timeout: Some(timeout) }
    }

    /// A query, any reply will do.
    pub fn query(message: impl Into<String>, timeout: Duration) -> Self {
        Self { message: message.into(), expected_reply: None, timeout: Some(timeout) }
    }

    /// Send and don't wait for any reply, eg for `rc`.
    pub fn fire_and_forget(message: impl Into<String>) -> Self {
        Self { message: message.into(), expected_reply: None, timeout: None }
    }
}

/// Why a command didn't succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFailure {
    /// No reply within the deadline.
    Timeout,
    /// The drone didn't understand the command text.
    UnknownCommand,
    /// The drone replied, but not with the expected reply.
    Rejected,
    /// The socket itself failed.
    Transport(io::ErrorKind)
}

impl CommandFailure {
    pub fn code(&self) -> i32 {
        match self {
            CommandFailure::Timeout => 1,
            CommandFailure::UnknownCommand => 2,
            CommandFailure::Rejected => 3,
            CommandFailure::Transport(_) => 4,
        }
    }
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub ok: bool,
    pub reply: Option<String>,
    pub failure: Option<CommandFailure>
}

impl CommandReply {
    fn success(reply: Option<String>) -> Self {
        Self { ok: true, reply, failure: None }
    }

    fn failed(failure: CommandFailure, reply: Option<String>) -> Self {
        Self { ok: false, reply, failure: Some(failure) }
    }

    pub fn error_code(&self) -> Option<i32> {
        self.failure.map(|f| f.code())
    }
}

/// Notifications for anyone watching the traffic, eg a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEvent {
    Issued { command: String },
    Completed { command: String, reply: CommandReply }
}

pub type CommandEventSender = mpsc::UnboundedSender<CommandEvent>;
pub type CommandEventReceiver = mpsc::UnboundedReceiver<CommandEvent>;

pub fn make_command_event_channel() -> (CommandEventSender, CommandEventReceiver) {
    mpsc::unbounded_channel()
}

/// Classifies a reply from the drone.
///
/// A fatal reply is an error whatever was expected, "unknown command" is
/// never a success, otherwise the reply must match the expected one (if any).
pub fn classify_reply(command: &str, reply: &str, expected_reply: Option<&str>) -> Result<CommandReply> {
    let reply = reply.trim();

    if FATAL_REPLIES.iter().any(|f| reply.eq_ignore_ascii_case(f)) {
        return Err(TelloError::DroneFault { command: command.to_string(), reply: reply.to_string() });
    }

    if reply.eq_ignore_ascii_case(UNKNOWN_COMMAND_REPLY) {
        return Ok(CommandReply::failed(CommandFailure::UnknownCommand, Some(reply.to_string())));
    }

    match expected_reply {
        None => Ok(CommandReply::success(Some(reply.to_string()))),
        Some(expected) if reply.eq_ignore_ascii_case(expected) => Ok(CommandReply::success(Some(reply.to_string()))),
        Some(_) => Ok(CommandReply::failed(CommandFailure::Rejected, Some(reply.to_string()))),
    }
}

/// The UDP socket commands go out on and replies come back on.
///
/// Only one command is ever in flight: a command holds the channel from send
/// until its reply or timeout, so callers sharing the channel queue up.
#[derive(Debug)]
pub struct CommandChannel {
    sock: UdpSocket,
    in_flight: Mutex<()>,
    events: Option<CommandEventSender>
}

impl CommandChannel {
    /// Binds an ephemeral local port and points it at the drone.
    pub async fn open(drone_address: &str, events: Option<CommandEventSender>) -> Result<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0").await?;
        sock.connect(drone_address).await?;
        info!("[Control] {} → {drone_address}", sock.local_addr()?);
        Ok(Self { sock, in_flight: Mutex::new(()), events })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.sock.local_addr()?)
    }

    /// Sends a command and, unless it is fire-and-forget, waits for the reply.
    ///
    /// Timeouts, rejections and socket failures come back as a failed
    /// `CommandReply`. Only a fatal reply from the drone is an `Err`.
    pub async fn send(&self, command: &PendingCommand) -> Result<CommandReply> {
        let _guard = self.in_flight.lock().await;
        let msg = command.message.as_str();

        self.notify(CommandEvent::Issued { command: msg.to_string() });
        let result = self.exchange(command).await;

        match &result {
            Ok(reply) => {
                if reply.failure == Some(CommandFailure::UnknownCommand) {
                    warn!("[Control] drone doesn't know \"{msg}\"");
                }
                self.notify(CommandEvent::Completed { command: msg.to_string(), reply: reply.clone() });
            }
            Err(err) => error!("[Control] {err}"),
        }

        result
    }

    async fn exchange(&self, command: &PendingCommand) -> Result<CommandReply> {
        let msg = command.message.as_str();

        self.discard_stale_replies();

        debug!("[Control] SEND {msg}");
        if let Err(err) = self.sock.send(msg.as_bytes()).await {
            warn!("[Control] failed to send \"{msg}\" ({err})");
            return Ok(CommandReply::failed(CommandFailure::Transport(err.kind()), None));
        }

        let Some(wait) = command.timeout else {
            return Ok(CommandReply::success(None));
        };

        let mut buf = vec![0; MAX_REPLY_SIZE];
        let n = match timeout(wait, self.sock.recv(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                warn!("[Control] no reply to \"{msg}\" ({err})");
                return Ok(CommandReply::failed(CommandFailure::Transport(err.kind()), None));
            }
            Err(_) => {
                warn!("[Control] \"{msg}\" timed out after {wait:?}");
                return Ok(CommandReply::failed(CommandFailure::Timeout, None));
            }
        };

        let response = String::from_utf8_lossy(&buf[..n]);
        debug!("[Control] RECEIVED {}", response.trim());

        classify_reply(msg, &response, command.expected_reply.as_deref())
    }

    /// Drops replies that arrived after their command timed out, so they
    /// can't be taken for the reply to the next one.
    fn discard_stale_replies(&self) {
        let mut buf = [0; MAX_REPLY_SIZE];
        while let Ok(n) = self.sock.try_recv(&mut buf) {
            debug!("[Control] discarding late reply {:?}", String::from_utf8_lossy(&buf[..n]));
        }
    }

    fn notify(&self, event: CommandEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
