use std::path::PathBuf;

use thiserror::Error;

use crate::control::CommandFailure;

pub type Result<T> = std::result::Result<T, TelloError>;

#[derive(Error, Debug)]
pub enum TelloError {
    #[error("WiFi not connected")]
    WiFiNotConnected,

    #[error("failed to parse \"{msg}\"")]
    ParseError { msg: String },

    #[error("{msg}")]
    Generic { msg: String },

    #[error("invalid command: {msg}")]
    InvalidCommand { msg: String },

    /// A command the drone didn't carry out, eg it timed out.
    #[error("\"{command}\" failed ({failure:?}, reply {reply:?})")]
    CommandFailed {
        command: String,
        reply: Option<String>,
        failure: Option<CommandFailure>
    },

    /// The drone answered with one of its fatal replies, eg it landed by
    /// itself or the motors stopped.
    #[error("drone fault after \"{command}\": {reply}")]
    DroneFault { command: String, reply: String },

    #[error("failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings error: {0}")]
    SettingsError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
