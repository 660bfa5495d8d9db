//! Camera capture handle with a shared latest-frame buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::capture_loop::{run_capture_loop, CaptureCommand};
use super::device::list_devices;
use super::types::{CameraError, CameraSettings, Frame, Resolution};

/// Camera capture handle.
///
/// A background thread continuously captures and decodes frames, storing the
/// most recent one in a shared buffer; the drive loop samples it with
/// [`latest_frame`](CameraCapture::latest_frame) at its own pace. The camera
/// itself is opened inside the thread (nokhwa's `Camera` isn't `Send`).
pub struct CameraCapture {
    /// Latest captured frame (shared with the capture thread)
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    /// Capture thread handle
    capture_thread: Option<JoinHandle<()>>,
    /// Channel to send commands to the capture thread
    command_tx: Option<Sender<CaptureCommand>>,
    /// Signal to stop the capture thread
    stop_signal: Arc<AtomicBool>,
    /// Requested settings
    settings: CameraSettings,
    /// Negotiated resolution (set after the stream opens)
    actual_resolution: Option<Resolution>,
    /// Negotiated FPS (set after the stream opens)
    actual_fps: Option<u32>,
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("settings", &self.settings)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CameraCapture {
    /// Validate the device exists and build an idle capture handle.
    ///
    /// The camera stream is not opened until [`start`](CameraCapture::start).
    ///
    /// # Errors
    /// * `CameraError::DeviceNotFound` - If the device index doesn't exist
    pub fn open(settings: CameraSettings) -> Result<Self, CameraError> {
        let devices = list_devices()?;
        if !devices.iter().any(|d| d.index == settings.device_index) {
            return Err(CameraError::DeviceNotFound(settings.device_index));
        }

        Ok(Self {
            frame_buffer: Arc::new(Mutex::new(None)),
            capture_thread: None,
            command_tx: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            settings,
            actual_resolution: None,
            actual_fps: None,
        })
    }

    /// Get the requested camera settings.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Get the resolution the camera actually negotiated.
    ///
    /// `None` until the stream has started; may differ from the requested
    /// resolution when the device doesn't support it exactly.
    pub fn actual_resolution(&self) -> Option<Resolution> {
        self.actual_resolution
    }

    /// Get the frame rate the camera actually negotiated.
    pub fn actual_fps(&self) -> Option<u32> {
        self.actual_fps
    }

    /// Start capturing frames in a background thread.
    ///
    /// Blocks until the thread reports the negotiated format or an error.
    ///
    /// # Errors
    /// * `CameraError::AlreadyRunning` - If capture is already running
    /// * `CameraError::OpenFailed` / `CameraError::StreamFailed` - If the
    ///   device cannot be opened or streamed
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.is_running() {
            return Err(CameraError::AlreadyRunning);
        }

        self.stop_signal.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel();
        self.command_tx = Some(tx);

        let buffer = Arc::clone(&self.frame_buffer);
        let stop = Arc::clone(&self.stop_signal);
        let settings = self.settings.clone();

        let (info_tx, info_rx) = mpsc::channel::<Result<(Resolution, u32), CameraError>>();

        let handle = thread::spawn(move || {
            run_capture_loop(settings, buffer, stop, rx, info_tx);
        });
        self.capture_thread = Some(handle);

        match info_rx.recv() {
            Ok(Ok((resolution, fps))) => {
                self.actual_resolution = Some(resolution);
                self.actual_fps = Some(fps);
                Ok(())
            }
            Ok(Err(e)) => {
                self.join_thread();
                Err(e)
            }
            Err(_) => {
                self.join_thread();
                Err(CameraError::StreamFailed(
                    "Capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Stop the capture thread and wait for it to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }
        self.join_thread();
    }

    /// Get a clone of the most recently captured frame.
    ///
    /// Returns `None` if no frame has arrived yet or capture is not running.
    pub fn latest_frame(&self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    /// Check whether the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn join_thread(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
