//! The per-connection drive session: one tick = one frame = one command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::OwnedMutexGuard;

use crate::actuator::{Actuator, ActuatorError};
use crate::camera::{CameraCapture, CameraError, CameraSettings};
use crate::control::{DriveMode, Navigator, NavigatorConfig};
use crate::stream::{encode_frame, StreamError};
use crate::vision::{annotate_frame, LineDetector};

/// Per-session pacing and encoding settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Fixed inter-frame interval; the sole throttle on loop rate.
    pub tick_interval: Duration,
    /// JPEG quality for the viewer stream, 1-100.
    pub jpeg_quality: u8,
}

/// Errors that end a drive session abnormally.
///
/// A disconnecting viewer is not among them; transport closure ends the
/// session cleanly.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("camera setup task failed: {0}")]
    CameraTask(String),
    #[error("actuator error: {0}")]
    Actuator(#[from] ActuatorError),
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Drive one viewer connection until it closes or shutdown is requested.
///
/// Per tick: sample the latest camera frame, detect the line, advance the
/// state machine, write the command to the actuator, and push the annotated
/// frame to the viewer. The camera thread and the actuator guard are
/// released on every exit path when their owners drop.
pub async fn run(
    mut socket: TcpStream,
    mut actuator: OwnedMutexGuard<Actuator>,
    camera_settings: CameraSettings,
    config: SessionConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<(), SessionError> {
    let peer = socket
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("viewer {} connected, starting drive session", peer);

    // nokhwa's open/start block on device negotiation; keep that off the
    // async runtime.
    let camera = tokio::task::spawn_blocking(move || -> Result<CameraCapture, CameraError> {
        let mut camera = CameraCapture::open(camera_settings)?;
        camera.start()?;
        Ok(camera)
    })
    .await
    .map_err(|e| SessionError::CameraTask(e.to_string()))??;

    let mut detector = LineDetector::new();
    let mut navigator = Navigator::new(NavigatorConfig::default());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested, ending drive session for {}", peer);
            break;
        }

        // The capture thread may not have produced a frame yet.
        let Some(mut frame) = camera.latest_frame() else {
            tokio::time::sleep(config.tick_interval).await;
            continue;
        };

        let now = Instant::now();
        let observation = detector.detect(&frame);
        let (command, mode) = navigator.tick(&observation, now);

        actuator.send(&command)?;
        debug!(
            "[{}] steer={}, throttle={}, cov={:.3}",
            mode, command.steer, command.throttle, observation.coverage
        );

        let (roi_mask, roi) = detector.roi_view();
        annotate_frame(&mut frame, roi_mask, roi, mode_color(mode));

        let payload = encode_frame(&frame, config.jpeg_quality)?;
        if let Err(e) = send_payload(&mut socket, &payload).await {
            info!("viewer {} disconnected: {}", peer, e);
            break;
        }

        // Fixed pacing: processing latency directly reduces the effective
        // frame rate.
        tokio::time::sleep(config.tick_interval).await;
    }

    info!("drive session for {} ended", peer);
    Ok(())
}

async fn send_payload(socket: &mut TcpStream, payload: &str) -> std::io::Result<()> {
    socket.write_all(payload.as_bytes()).await?;
    socket.write_all(b"\n").await?;
    Ok(())
}

/// Badge color for the annotated frame's mode indicator.
fn mode_color(mode: DriveMode) -> [u8; 3] {
    match mode {
        DriveMode::Forward => [0, 200, 0],
        DriveMode::ForwardDelay => [220, 220, 0],
        DriveMode::Man2AutoDelay => [220, 140, 0],
        DriveMode::Recover | DriveMode::RecoverInit => [220, 0, 0],
        DriveMode::Undef => [128, 128, 128],
    }
}
