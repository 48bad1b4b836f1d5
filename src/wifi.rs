use tokio::process::Command;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::errors::{Result, TelloError};

const POLL_INTERVAL:Duration = Duration::from_millis(500);

/// Waits for this machine to join a WiFi network named `ssid_prefix`...,
/// failing with `WiFiNotConnected` once `limit` has passed.
pub async fn wait_for_wifi(ssid_prefix: &str, limit: Duration) -> Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        match current_networks().await {
            Ok(networks) => {
                debug!("[WiFi] on {networks:?}");
                if networks.iter().any(|n| n.starts_with(ssid_prefix)) {
                    return Ok(());
                }
            }
            Err(err) => warn!("[WiFi] couldn't read network name ({err})"),
        }

        if Instant::now() >= deadline {
            return Err(TelloError::WiFiNotConnected);
        }
        sleep(POLL_INTERVAL).await;
    }
}

//////////////////////////////////////////////////////////////////////////////
// macOS

#[cfg(target_os = "macos")]
async fn current_networks() -> Result<Vec<String>> {
    let output = run_command("networksetup", &["-listallhardwareports"]).await?;
    let mut networks = vec![];
    for device in wifi_devices(&output) {
        // eg "Current Wi-Fi Network: TELLO-5A0F21"
        let s = run_command("networksetup", &["-getairportnetwork", &device]).await?;
        if let Some(name) = s.trim().strip_prefix("Current Wi-Fi Network: ") {
            networks.push(name.to_string());
        }
    }
    Ok(networks)
}

/// Picks the devices out of `networksetup -listallhardwareports` output.
#[cfg(any(target_os = "macos", test))]
fn wifi_devices(output: &str) -> Vec<String> {
    let mut found_wifi = false;
    let mut devices:Vec<String> = vec![];
    for l in output.lines() {
        if !found_wifi {
            // looking for something like "Hardware Port: Wi-Fi"...
            found_wifi = l.contains("Wi-Fi");
        }
        else {
            // ...then next like should be like "Device: en1"
            found_wifi = false;
            devices.push(l.trim_start_matches("Device: ").trim().to_string());
        }
    }
    devices
}

//////////////////////////////////////////////////////////////////////////////
// linux

#[cfg(target_os = "linux")]
async fn current_networks() -> Result<Vec<String>> {
    let s = run_command("iwgetid", &["-r"]).await?;
    Ok(s.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}

//////////////////////////////////////////////////////////////////////////////
// anything else

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
async fn current_networks() -> Result<Vec<String>> {
    Err(TelloError::Generic { msg: "reading the WiFi network is not implemented for this OS".to_string() })
}

//////////////////////////////////////////////////////////////////////////////

#[cfg(any(target_os = "macos", target_os = "linux"))]
async fn run_command(cmd: &str, args: &[&str]) -> Result<String> {
    let raw_output = Command::new(cmd)
        .args(args)
        .output()
        .await
        .map_err(|source| TelloError::ProcessLaunch { program: cmd.to_string(), source })?;

    String::from_utf8(raw_output.stdout).map_err(
        |e| TelloError::Generic { msg: format!("failed to decode {cmd} output - {e:?}") }
    )
}
