use std::path::PathBuf;

use tokio::time::Duration;

use crate::errors::{Result, TelloError};

pub const DEFAULT_DISTANCE:u32 = 20;
pub const DEFAULT_ANGLE:u32 = 10;
pub const DEFAULT_SLEEP_SECONDS:f64 = 1.0;

const TIMEOUT_MARGIN_MS:u64 = 2000;
const TURN_DEGREES_PER_SECOND:u64 = 30;

/// Time to allow for moving `distance` cm at `speed` cm/s, plus a margin.
pub fn travel_timeout(distance: u32, speed: f64) -> Duration {
    let ms = (distance as f64 * 1000.0 / speed.max(1.0)).floor() as u64;
    Duration::from_millis(ms + TIMEOUT_MARGIN_MS)
}

/// Time to allow for turning `degrees`, plus a margin.
pub fn rotation_timeout(degrees: u32) -> Duration {
    let ms = degrees as u64 * 1000 / TURN_DEGREES_PER_SECOND;
    Duration::from_millis(ms + TIMEOUT_MARGIN_MS)
}

/// One remote control channel as sent to the drone.
///
/// With `speed_scale` the value is taken as a fraction of the current speed.
/// The result is truncated toward zero and clamped to -100..=100.
pub fn rc_channel(value: f64, speed_scale: Option<f64>) -> i8 {
    let scaled = match speed_scale {
        Some(speed) => value * speed,
        None => value,
    };
    (scaled.trunc() as i64).clamp(-100, 100) as i8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Back
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::Back => "back",
        }
    }

    fn from_word(w: &str) -> Option<Self> {
        Some(match w {
            "up" => Direction::Up,
            "down" => Direction::Down,
            "left" => Direction::Left,
            "right" => Direction::Right,
            "forward" => Direction::Forward,
            "back" => Direction::Back,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise
}

impl Rotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::Clockwise => "cw",
            Rotation::CounterClockwise => "ccw",
        }
    }
}

/// A line of console or command file input, understood.
#[derive(Debug, Clone, PartialEq)]
pub enum TelloCommand {
    Nothing,
    End,
    TakeOff,
    Land,
    Emergency,
    Photo,
    ToggleVideo,
    ToggleStream,
    StreamOn,
    StreamOff,
    Query(String),
    Sleep(Duration),
    /// Execute a command file, the configured one if no path is given.
    Run(Option<PathBuf>),
    Speed(u8),
    Move { direction: Direction, distance: u32 },
    Turn { rotation: Rotation, degrees: u32 },
    RemoteControl { left_right: f64, forwards_backwards: f64, up_down: f64, yaw: f64 },
    /// Anything else goes to the drone as is.
    Raw(String)
}

impl TelloCommand {
    pub fn parse(line: &str) -> Result<TelloCommand> {
        let original = line.trim();
        let line = original.to_lowercase();
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(TelloCommand::Nothing);
        };
        let arg = words.next();

        let command = match line.as_str() {
            "end" => TelloCommand::End,
            "land" => TelloCommand::Land,
            "takeoff" => TelloCommand::TakeOff,
            "photo" | "p" => TelloCommand::Photo,
            "video" | "v" => TelloCommand::ToggleVideo,
            "stream" | "s" => TelloCommand::ToggleStream,
            _ if line.ends_with('?') => TelloCommand::Query(line.clone()),
            _ => match first {
                "sleep" => {
                    let seconds = arg
                        .and_then(|s| s.parse::<f64>().ok())
                        .filter(|s| s.is_finite() && *s >= 0.0)
                        .unwrap_or(DEFAULT_SLEEP_SECONDS);
                    let duration = Duration::try_from_secs_f64(seconds)
                        .map_err(|_| TelloError::InvalidCommand { msg: format!("sleep {seconds}, too long") })?;
                    TelloCommand::Sleep(duration)
                }
                "run" | "load" => {
                    // paths keep their case and may contain spaces
                    let path = original[first.len()..].trim();
                    TelloCommand::Run((!path.is_empty()).then(|| PathBuf::from(path)))
                }
                "cw" | "ccw" => {
                    let rotation = if first == "cw" { Rotation::Clockwise } else { Rotation::CounterClockwise };
                    let degrees = arg.and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_ANGLE);
                    TelloCommand::Turn { rotation, degrees }
                }
                "rc" => parse_remote_control(&line)?,
                "emergency" => TelloCommand::Emergency,
                "streamon" => TelloCommand::StreamOn,
                "streamoff" => TelloCommand::StreamOff,
                "speed" => {
                    let speed = arg
                        .and_then(|s| s.parse::<u8>().ok())
                        .filter(|s| (10..=100).contains(s))
                        .ok_or_else(|| TelloError::InvalidCommand { msg: format!("\"{line}\", speed must be 10..100") })?;
                    TelloCommand::Speed(speed)
                }
                w => match Direction::from_word(w) {
                    Some(direction) => {
                        let distance = arg.and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_DISTANCE);
                        TelloCommand::Move { direction, distance }
                    }
                    None => TelloCommand::Raw(line.clone()),
                },
            },
        };

        Ok(command)
    }
}

fn parse_remote_control(line: &str) -> Result<TelloCommand> {
    let values = line
        .split_whitespace()
        .skip(1)
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| TelloError::InvalidCommand { msg: format!("\"{line}\", expected rc <lr> <fb> <ud> <yaw>") })?;

    match values[..] {
        [left_right, forwards_backwards, up_down, yaw] => Ok(TelloCommand::RemoteControl { left_right, forwards_backwards, up_down, yaw }),
        _ => Err(TelloError::InvalidCommand { msg: format!("\"{line}\", expected rc <lr> <fb> <ud> <yaw>") }),
    }
}
