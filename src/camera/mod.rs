//! Camera capture module for webcam access and frame acquisition.
//!
//! - Device enumeration via [`list_devices`]
//! - Continuous capture with a latest-frame buffer via [`CameraCapture`]
//! - Configuration via [`CameraSettings`] and [`Resolution`]

mod capture;
mod capture_loop;
mod device;
mod types;

pub use capture::CameraCapture;
pub use device::list_devices;
pub use types::{CameraError, CameraInfo, CameraSettings, Frame, FrameFormat, Resolution};
