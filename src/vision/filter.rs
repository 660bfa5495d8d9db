//! Pixel filters over grayscale and binary buffers.
//!
//! All filters follow the `_into` convention: the caller owns the output
//! buffers, so repeated per-frame use does not allocate.

use crate::camera::Frame;

/// 5-tap binomial kernel, an integer fit to the 5x5 gaussian.
const BLUR_KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
const BLUR_KERNEL_SUM: u32 = 16;

fn resize_buffer(buffer: &mut Vec<u8>, len: usize) {
    buffer.clear();
    buffer.resize(len, 0);
}

/// Convert an RGB frame to grayscale using the ITU-R BT.601 luminance
/// formula, reusing an existing buffer.
///
/// Uses integer math in the hot path; coefficients are scaled by 1000
/// (299, 587, 114).
pub fn to_grayscale_into(frame: &Frame, buffer: &mut Vec<u8>) {
    let pixel_count = (frame.width * frame.height) as usize;
    buffer.clear();
    buffer.reserve(pixel_count);

    for rgb in frame.data.chunks_exact(3) {
        let r = rgb[0] as u32;
        let g = rgb[1] as u32;
        let b = rgb[2] as u32;
        let luminance = (299 * r + 587 * g + 114 * b) / 1000;
        buffer.push(luminance as u8);
    }
}

/// Blur a grayscale buffer with a separable 5-tap binomial kernel.
///
/// Runs a horizontal pass into `tmp` and a vertical pass into `dst`.
/// Borders replicate the edge pixel.
pub fn gaussian_blur_into(
    src: &[u8],
    width: usize,
    height: usize,
    tmp: &mut Vec<u8>,
    dst: &mut Vec<u8>,
) {
    resize_buffer(tmp, width * height);
    resize_buffer(dst, width * height);
    if width == 0 || height == 0 {
        return;
    }

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut sum = 0u32;
            for (k, &weight) in BLUR_KERNEL.iter().enumerate() {
                let sx = (x + k).saturating_sub(2).min(width - 1);
                sum += weight * row[sx] as u32;
            }
            tmp[y * width + x] = ((sum + BLUR_KERNEL_SUM / 2) / BLUR_KERNEL_SUM) as u8;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            for (k, &weight) in BLUR_KERNEL.iter().enumerate() {
                let sy = (y + k).saturating_sub(2).min(height - 1);
                sum += weight * tmp[sy * width + x] as u32;
            }
            dst[y * width + x] = ((sum + BLUR_KERNEL_SUM / 2) / BLUR_KERNEL_SUM) as u8;
        }
    }
}

/// Binarize with inverted polarity: pixels at or below `threshold` become
/// foreground (255), everything brighter becomes background (0).
///
/// A dark line on a light floor ends up as the foreground mask.
pub fn threshold_inv_into(src: &[u8], threshold: u8, dst: &mut Vec<u8>) {
    dst.clear();
    dst.extend(src.iter().map(|&v| if v <= threshold { 255 } else { 0 }));
}

/// Dilate a binary mask with a square kernel (separable max filter).
pub fn dilate_rect_into(
    src: &[u8],
    width: usize,
    height: usize,
    kernel: usize,
    tmp: &mut Vec<u8>,
    dst: &mut Vec<u8>,
) {
    rect_pass(src, width, height, kernel, true, tmp, dst);
}

/// Erode a binary mask with a square kernel (separable min filter).
pub fn erode_rect_into(
    src: &[u8],
    width: usize,
    height: usize,
    kernel: usize,
    tmp: &mut Vec<u8>,
    dst: &mut Vec<u8>,
) {
    rect_pass(src, width, height, kernel, false, tmp, dst);
}

/// Morphologically close a binary mask: dilate then erode.
///
/// Bridges gaps smaller than the kernel without growing the mask's outer
/// extent.
pub fn close_rect_into(
    src: &[u8],
    width: usize,
    height: usize,
    kernel: usize,
    tmp_a: &mut Vec<u8>,
    tmp_b: &mut Vec<u8>,
    dst: &mut Vec<u8>,
) {
    dilate_rect_into(src, width, height, kernel, tmp_a, tmp_b);
    erode_rect_into(tmp_b, width, height, kernel, tmp_a, dst);
}

/// One square-kernel morphology operation as two 1-D window passes.
/// Windows clamp at the image border.
fn rect_pass(
    src: &[u8],
    width: usize,
    height: usize,
    kernel: usize,
    grow: bool,
    tmp: &mut Vec<u8>,
    dst: &mut Vec<u8>,
) {
    resize_buffer(tmp, width * height);
    resize_buffer(dst, width * height);
    if width == 0 || height == 0 || kernel == 0 {
        return;
    }
    let radius = kernel / 2;

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            let mut window = row[lo..=hi].iter();
            let hit = if grow {
                window.any(|&v| v != 0)
            } else {
                window.all(|&v| v != 0)
            };
            tmp[y * width + x] = if hit { 255 } else { 0 };
        }
    }

    for y in 0..height {
        for x in 0..width {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(height - 1);
            let mut window = (lo..=hi).map(|yy| tmp[yy * width + x]);
            let hit = if grow {
                window.any(|v| v != 0)
            } else {
                window.all(|v| v != 0)
            };
            dst[y * width + x] = if hit { 255 } else { 0 };
        }
    }
}
