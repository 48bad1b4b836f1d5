extern crate tello_console;

use std::time::Duration;

use tello_console::{TelloOptions, Tello, Result};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    watch().await.unwrap();
}

async fn watch() -> Result<()> {
    let mut options = TelloOptions::default();
    let mut state_rx = options.with_state();

    tokio::spawn(async move {
        while let Some(state) = state_rx.recv().await {
            println!("STATE {state:#?}");
        }
    });

    let drone = Tello::with_options(options)
        .wait_for_wifi("TELLO", Duration::from_secs(60)).await?;

    let drone = drone.connect().await?;

    // the cache can be read from anywhere meanwhile
    let telemetry = drone.telemetry();
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!("battery {:?}% height {:?}cm", telemetry.battery(), telemetry.height());
    }

    drone.disconnect().await?;

    Ok(())
}
