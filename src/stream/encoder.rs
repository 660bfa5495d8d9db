//! JPEG + base64 frame encoding for the viewer stream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use crate::camera::Frame;

/// Errors from encoding frames for the wire.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to encode frame as JPEG: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Encode a frame as base64(JPEG) for one wire payload.
///
/// The viewer decodes base64 and renders the JPEG; the payload itself
/// carries no framing, the session loop appends the newline.
pub fn encode_frame(frame: &Frame, quality: u8) -> Result<String, StreamError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        &frame.data,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(STANDARD.encode(&jpeg))
}
