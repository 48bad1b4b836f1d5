extern crate tello_console;

use std::time::Duration;

use tello_console::{Tello, Result};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    take_off_and_land().await.unwrap();
}

async fn take_off_and_land() -> Result<()> {
    let drone = Tello::new()
        .wait_for_wifi("TELLO", Duration::from_secs(60)).await?;

    let mut drone = drone.connect().await?;

    drone.take_off().await?;
    drone.turn_clockwise(360).await?;
    drone.land().await?;

    drone.disconnect().await?;

    Ok(())
}
