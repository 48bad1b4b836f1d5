mod common;

use std::path::Path;

use common::*;
use tello_console::{CaptureKind, Connected, Tello, TelloError};

async fn connect_with_launcher(drone: &FakeDrone, launcher: &FakeLauncher) -> Tello<Connected> {
    connect_with(options_for(drone).with_launcher(Box::new(launcher.clone()))).await
}

#[tokio::test]
async fn photo_preempts_live_view_which_comes_back_after() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_streaming().await.unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Streaming]);

    tello.take_photo(Path::new("a.jpg")).await.unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Photo]);
    assert_eq!(launcher.launched().len(), 2);

    // nothing was recording, but live view is still wanted
    tello.stop_recording().unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Streaming]);
    assert_eq!(launcher.launched().len(), 3);

    assert!(tello.session().streaming);
    assert_eq!(drone.commands_after_connect(), vec!["streamon"]);
}

#[tokio::test]
async fn stopping_recording_keeps_live_view() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_streaming().await.unwrap();
    tello.start_recording(Path::new("a.mp4")).await.unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Recording]);
    assert!(tello.session().recording);

    tello.stop_recording().unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Streaming]);
    assert!(!tello.session().recording);
    assert!(tello.session().streaming);
}

#[tokio::test]
async fn stopping_live_view_keeps_recording() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_recording(Path::new("a.mp4")).await.unwrap();

    // the recording decoder stays the only one
    tello.start_streaming().await.unwrap();
    assert_eq!(launcher.launched().len(), 1);

    tello.stop_streaming().await.unwrap();
    assert_eq!(launcher.alive(), vec![CaptureKind::Recording]);
    assert!(tello.session().streaming, "video transport still needed for recording");

    tello.stop_recording().unwrap();
    assert!(launcher.alive().is_empty());
    assert_eq!(drone.commands_after_connect(), vec!["streamon"]);
}

#[tokio::test]
async fn photo_interrupts_recording() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_recording(Path::new("a.mp4")).await.unwrap();
    tello.take_photo(Path::new("b.jpg")).await.unwrap();

    assert!(!tello.session().recording);
    assert_eq!(launcher.alive(), vec![CaptureKind::Photo]);
}

#[tokio::test]
async fn launch_failure_leaves_recording_off() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::failing();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    let r = tello.start_recording(Path::new("a.mp4")).await;
    assert!(matches!(r, Err(TelloError::ProcessLaunch { .. })));
    assert!(!tello.session().recording);

    let r = tello.toggle_streaming().await;
    assert!(matches!(r, Err(TelloError::ProcessLaunch { .. })));
    assert!(!tello.video().live_view());
}

#[tokio::test]
async fn failed_recording_falls_back_to_live_view() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_streaming().await.unwrap();
    launcher.fail_on(&[CaptureKind::Recording]);

    let r = tello.start_recording(Path::new("a.mp4")).await;
    assert!(matches!(r, Err(TelloError::ProcessLaunch { .. })));
    assert!(!tello.session().recording);
    assert!(tello.video().live_view());
    assert_eq!(launcher.alive(), vec![CaptureKind::Streaming]);
}

#[tokio::test]
async fn live_view_lost_with_failed_recording_is_not_claimed() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_streaming().await.unwrap();
    launcher.fail_on(&[CaptureKind::Recording, CaptureKind::Streaming]);

    assert!(tello.start_recording(Path::new("a.mp4")).await.is_err());
    assert!(launcher.alive().is_empty());
    assert!(!tello.video().live_view());

    // the next toggle turns live view back on rather than off
    launcher.fail_on(&[]);
    assert!(tello.toggle_streaming().await.unwrap());
    assert_eq!(launcher.alive(), vec![CaptureKind::Streaming]);
    assert_eq!(drone.commands_after_connect(), vec!["streamon"]);
}

#[tokio::test]
async fn refused_streamon_starts_no_decoder() {
    let drone = FakeDrone::with_responder(|c| {
        if c == "streamon" { Some("error".to_string()) } else { well_behaved(c) }
    }).await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    assert!(tello.take_photo(Path::new("a.jpg")).await.is_err());
    assert!(launcher.launched().is_empty());
    assert!(!tello.session().streaming);
}

#[tokio::test]
async fn disconnect_kills_the_decoder() {
    let drone = FakeDrone::start().await;
    let launcher = FakeLauncher::default();
    let mut tello = connect_with_launcher(&drone, &launcher).await;

    tello.start_recording(Path::new("a.mp4")).await.unwrap();
    let tello = tello.disconnect().await.unwrap();

    assert!(launcher.alive().is_empty());
    assert!(!tello.session().recording);
    assert_eq!(drone.commands_after_connect(), vec!["streamon", "streamoff"]);
}
