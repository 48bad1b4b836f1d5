//! Settings file and the configuration read from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::control::CONTROL_UDP_PORT;
use crate::errors::{Result, TelloError};
use crate::options::{TelloOptions, DEFAULT_DRONE_HOST, DEFAULT_SPEED};
use crate::state::STATE_UDP_PORT;
use crate::video::DecoderConfig;

/// Key-value settings kept in a JSON file.
///
/// Reading a setting that isn't there stores its default, so the file ends up
/// listing everything that can be set.
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>
}

impl Settings {
    /// Loads settings from `path`. A missing file is just empty settings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("[Settings] no {path:?} yet");
                Map::new()
            }
            Err(source) => return Err(TelloError::FileError { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The value of `key`, or `default` (saved for next time) if it is
    /// missing or doesn't fit `T`.
    pub fn get_or_add_setting<T: Serialize + DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T> {
        if let Some(v) = self.values.get(key) {
            match serde_json::from_value(v.clone()) {
                Ok(v) => return Ok(v),
                Err(err) => warn!("[Settings] replacing bad {key} ({err})"),
            }
        }
        self.values.insert(key.to_string(), serde_json::to_value(&default)?);
        self.save()?;
        Ok(default)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| TelloError::FileError { path: dir.to_path_buf(), source })?;
        }
        let payload = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, payload).map_err(|source| TelloError::FileError { path: self.path.clone(), source })
    }
}

/// Everything the console needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub drone_host: String,
    pub default_speed: f64,
    pub photo_folder: PathBuf,
    pub video_folder: PathBuf,
    pub decoder: DecoderConfig,
    /// Treat `rc` channel values as fractions of the current speed.
    pub rc_speed_scaling: bool,
    /// Executed by `run`/`load` without a path.
    pub command_file: PathBuf,
    pub wait_for_wifi: bool,
    pub wifi_ssid_prefix: String
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drone_host: DEFAULT_DRONE_HOST.to_string(),
            default_speed: DEFAULT_SPEED,
            photo_folder: PathBuf::from("photos"),
            video_folder: PathBuf::from("videos"),
            decoder: DecoderConfig::default(),
            rc_speed_scaling: false,
            command_file: PathBuf::from("telloCommands.txt"),
            wait_for_wifi: false,
            wifi_ssid_prefix: "TELLO".to_string(),
        }
    }
}

impl Config {
    pub fn from_settings(settings: &mut Settings) -> Result<Self> {
        let d = Config::default();
        let decoder = DecoderConfig {
            program: settings.get_or_add_setting("decoder_path", d.decoder.program)?,
            debug: settings.get_or_add_setting("decoder_debug", d.decoder.debug)?,
            ..d.decoder
        };

        Ok(Self {
            drone_host: settings.get_or_add_setting("drone_host", d.drone_host)?,
            default_speed: settings.get_or_add_setting("default_speed", d.default_speed)?.clamp(10.0, 100.0),
            photo_folder: settings.get_or_add_setting("photo_folder", d.photo_folder)?,
            video_folder: settings.get_or_add_setting("video_folder", d.video_folder)?,
            decoder,
            rc_speed_scaling: settings.get_or_add_setting("rc_speed_scaling", d.rc_speed_scaling)?,
            command_file: settings.get_or_add_setting("command_file", d.command_file)?,
            wait_for_wifi: settings.get_or_add_setting("wait_for_wifi", d.wait_for_wifi)?,
            wifi_ssid_prefix: settings.get_or_add_setting("wifi_ssid_prefix", d.wifi_ssid_prefix)?,
        })
    }

    pub fn tello_options(&self) -> TelloOptions {
        TelloOptions::default()
            .with_drone_address(format!("{}:{CONTROL_UDP_PORT}", self.drone_host))
            .with_state_address(format!("0.0.0.0:{STATE_UDP_PORT}"))
            .with_speed(self.default_speed)
            .with_decoder(self.decoder.clone())
    }
}
