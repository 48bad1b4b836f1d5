use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::sleep;
use tracing::{error, info};

use crate::command::{rc_channel, TelloCommand};
use crate::config::Config;
use crate::control::CommandReply;
use crate::errors::{Result, TelloError};
use crate::tello::{Connected, Tello, RAW_TIMEOUT};

/// Whether to carry on reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    End
}

/// Runs text commands, typed or from command files, against a connected
/// drone.
#[derive(Debug)]
pub struct Interpreter {
    drone: Tello<Connected>,
    config: Config
}

impl Interpreter {
    pub fn new(drone: Tello<Connected>, config: Config) -> Self {
        Self { drone, config }
    }

    pub fn drone(&self) -> &Tello<Connected> {
        &self.drone
    }

    pub fn drone_mut(&mut self) -> &mut Tello<Connected> {
        &mut self.drone
    }

    /// Hands the drone back, eg to disconnect it.
    pub fn into_drone(self) -> Tello<Connected> {
        self.drone
    }

    /// Reads commands until `end` or the end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, reader: R) -> Result<()> {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if !self.execute(&line).await {
                break;
            }
        }
        Ok(())
    }

    /// Executes one line, logging any failure. Returns `false` only for `end`.
    pub async fn execute(&mut self, line: &str) -> bool {
        match self.dispatch(line).await {
            Ok(flow) => flow == Flow::Continue,
            Err(err) => {
                error!("[Console] {err}");
                true
            }
        }
    }

    pub async fn dispatch(&mut self, line: &str) -> Result<Flow> {
        let command = TelloCommand::parse(line)?;
        let drone = &mut self.drone;

        match command {
            TelloCommand::Nothing => {}
            TelloCommand::End => return Ok(Flow::End),
            TelloCommand::TakeOff => { check("takeoff", drone.take_off().await?)?; }
            TelloCommand::Land => { check("land", drone.land().await?)?; }
            TelloCommand::Emergency => { check("emergency", drone.emergency().await?)?; }
            TelloCommand::StreamOn => { check("streamon", drone.stream_on().await?)?; }
            TelloCommand::StreamOff => { check("streamoff", drone.stream_off().await?)?; }
            TelloCommand::Photo => {
                let target = timestamped_path(&self.config.photo_folder, "jpg").await?;
                drone.take_photo(&target).await?;
                info!("[Console] photo → {}", target.display());
            }
            TelloCommand::ToggleVideo => {
                let target = timestamped_path(&self.config.video_folder, "mp4").await?;
                if drone.toggle_recording(&target).await? {
                    info!("[Console] recording → {}", target.display());
                }
                else {
                    info!("[Console] recording stopped");
                }
            }
            TelloCommand::ToggleStream => {
                let on = drone.toggle_streaming().await?;
                info!("[Console] live view {}", if on { "on" } else { "off" });
            }
            TelloCommand::Query(q) => {
                let reply = check(&q, drone.query(&q).await?)?;
                info!("[Console] {q} {}", reply.reply.unwrap_or_default());
            }
            TelloCommand::Sleep(duration) => sleep(duration).await,
            TelloCommand::Run(path) => {
                let path = path.unwrap_or_else(|| self.config.command_file.clone());
                self.run_file(&path).await?;
            }
            TelloCommand::Speed(speed) => { check("speed", drone.set_speed(speed).await?)?; }
            TelloCommand::Move { direction, distance } => {
                check(direction.as_str(), drone.move_by(direction, distance).await?)?;
            }
            TelloCommand::Turn { rotation, degrees } => {
                check(rotation.as_str(), drone.turn(rotation, degrees).await?)?;
            }
            TelloCommand::RemoteControl { left_right, forwards_backwards, up_down, yaw } => {
                let scale = self.config.rc_speed_scaling.then_some(drone.session().speed);
                let reply = drone.remote_control(
                    rc_channel(left_right, scale),
                    rc_channel(forwards_backwards, scale),
                    rc_channel(up_down, scale),
                    rc_channel(yaw, scale),
                ).await?;
                check("rc", reply)?;
            }
            TelloCommand::Raw(msg) => { check(&msg, drone.send_command(&msg, RAW_TIMEOUT).await?)?; }
        }

        Ok(Flow::Continue)
    }

    /// Executes every line of a command file, skipping blank lines and `#`
    /// comments. An `end` in the file ends the file, not the session.
    ///
    /// Nothing stops a file from running itself, which recurses until the
    /// process runs out of memory or is killed.
    pub fn run_file<'a>(&'a mut self, path: &'a Path) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!("[Console] RUN {}", path.display());
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| TelloError::FileError { path: path.to_path_buf(), source })?;

            for line in text.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if !self.execute(line).await {
                    break;
                }
            }
            Ok(())
        })
    }
}

fn check(command: &str, reply: CommandReply) -> Result<CommandReply> {
    if reply.ok {
        Ok(reply)
    }
    else {
        Err(TelloError::CommandFailed { command: command.to_string(), reply: reply.reply, failure: reply.failure })
    }
}

/// `<folder>/<local time to the millisecond>.<extension>`, creating the
/// folder if need be.
async fn timestamped_path(folder: &Path, extension: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|source| TelloError::FileError { path: folder.to_path_buf(), source })?;
    let name = Local::now().format("%Y-%m-%d_%H-%M-%S-%3f");
    Ok(folder.join(format!("{name}.{extension}")))
}
