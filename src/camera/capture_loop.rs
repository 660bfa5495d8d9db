//! Background capture thread implementation.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::types::{CameraError, CameraSettings, Frame, FrameFormat, Resolution};

/// Commands sent to the capture thread.
pub enum CaptureCommand {
    Stop,
}

/// Run the capture loop in a background thread.
///
/// Opens the camera, reports the negotiated resolution/fps back through
/// `info_tx`, then continuously decodes frames into the shared latest-frame
/// buffer until stopped.
pub fn run_capture_loop(
    settings: CameraSettings,
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    rx: Receiver<CaptureCommand>,
    info_tx: Sender<Result<(Resolution, u32), CameraError>>,
) {
    let index = CameraIndex::Index(settings.device_index);

    let mut camera = match open_camera_with_fallback(&index, &settings) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::StreamFailed(e.to_string())));
        return;
    }

    let res = camera.resolution();
    let actual = Resolution {
        width: res.width(),
        height: res.height(),
    };
    let _ = info_tx.send(Ok((actual, camera.frame_rate())));

    while !stop.load(Ordering::Relaxed) {
        if let Ok(CaptureCommand::Stop) = rx.try_recv() {
            break;
        }

        if let Ok(raw) = camera.frame() {
            // A frame that fails to decode is skipped; the next one retries.
            if let Some(frame) = decode_to_rgb(&raw) {
                if let Ok(mut slot) = buffer.lock() {
                    *slot = Some(frame);
                }
            }
        }

        // camera.frame() already blocks on the next frame; this only keeps
        // the stop flag responsive.
        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
}

/// Open the camera, preferring MJPEG near the requested resolution and
/// falling back to whatever the device offers.
fn open_camera_with_fallback(
    index: &CameraIndex,
    settings: &CameraSettings,
) -> Result<Camera, CameraError> {
    let format_attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            nokhwa::utils::Resolution::new(settings.resolution.width, settings.resolution.height),
            NokhwaFrameFormat::MJPEG,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    // Both attempts failed; last_error is necessarily set.
    Err(CameraError::OpenFailed(
        last_error.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

/// Decode a nokhwa buffer into an RGB [`Frame`].
///
/// nokhwa's `decode_image` converts MJPEG, YUYV, and other native formats.
/// Returns `None` on corrupt or unsupported data.
fn decode_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    Some(Frame {
        data: decoded.into_raw(),
        width: resolution.width(),
        height: resolution.height(),
        format: FrameFormat::Rgb,
        timestamp: Instant::now(),
    })
}
