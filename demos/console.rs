//////////////////////////////////////////////////////////////////////////////
//
// Interactive console
//
// Type commands, one per line, eg:
//
//   takeoff
//   up 50
//   cw 90
//   rc 0 20 0 0
//   battery?
//   p          (photo)
//   v          (start/stop recording)
//   s          (start/stop live view)
//   run flight.txt
//   end
//
// Settings are kept in tello-settings.json (or the file given as the first
// argument) and filled in with defaults on first run. Log level follows
// RUST_LOG, eg RUST_LOG=debug to see every command and reply.
//
//////////////////////////////////////////////////////////////////////////////

extern crate tello_console;

use std::time::Duration;

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tello_console::{Config, Interpreter, Settings, Tello};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings_path = std::env::args().nth(1).unwrap_or_else(|| "tello-settings.json".to_string());
    let mut settings = Settings::load(&settings_path).context("failed to load settings")?;
    let config = Config::from_settings(&mut settings)?;

    let drone = Tello::with_options(config.tello_options());
    let drone = if config.wait_for_wifi {
        drone.wait_for_wifi(&config.wifi_ssid_prefix, Duration::from_secs(60)).await?
    }
    else {
        drone.skip_wifi_check()
    };

    let drone = drone.connect().await.context("failed to connect to drone")?;

    let mut console = Interpreter::new(drone, config);
    console.run(BufReader::new(tokio::io::stdin())).await?;

    console.into_drone().disconnect().await?;

    Ok(())
}
