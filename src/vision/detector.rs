//! Per-frame line detection: one RGB frame in, one observation out.

use crate::camera::Frame;

use super::contour::find_external_contours;
use super::filter::{close_rect_into, gaussian_blur_into, threshold_inv_into, to_grayscale_into};

/// Fraction of the frame height excluded from the top of the analysis
/// window (horizon and background rows).
pub const ROI_RATIO: f32 = 0.4;
/// Rows excluded from the bottom of the analysis window.
pub const BOTTOM_MARGIN: u32 = 0;
/// Intensity cutoff separating the dark line from the light floor.
pub const INTENSITY_THRESHOLD: u8 = 120;
/// Side length of the square closing kernel.
pub const CLOSE_KERNEL: usize = 7;

/// What one frame says about the line.
///
/// Produced fresh each tick and consumed immediately by the navigator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineObservation {
    /// Horizontal mass center of the line inside the ROI, absent when the
    /// ROI carries no line mass at all.
    pub centroid_x: Option<u32>,
    /// Width of the frame the centroid was measured in.
    pub frame_width: u32,
    /// Fraction of the ROI area covered by line contours, in [0, 1].
    /// Noise-robust secondary presence signal.
    pub coverage: f32,
}

/// Analysis window rows, `[top, bottom)` over the full frame width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoiBounds {
    pub top: u32,
    pub bottom: u32,
}

/// Stateless line detection with stateful scratch buffers.
///
/// The pipeline is grayscale -> blur -> inverted threshold -> morphological
/// close -> ROI moments and contours. All intermediate buffers are owned by
/// the detector and reused across frames; the post-close ROI mask stays
/// readable after [`detect`](LineDetector::detect) for annotation.
#[derive(Default)]
pub struct LineDetector {
    gray: Vec<u8>,
    blurred: Vec<u8>,
    mask: Vec<u8>,
    closed: Vec<u8>,
    tmp_a: Vec<u8>,
    tmp_b: Vec<u8>,
    roi_mask: Vec<u8>,
    roi: RoiBounds,
}

impl LineDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduce one frame to a line observation.
    ///
    /// A zero-mass ROI yields an absent centroid, not a zero one; degenerate
    /// frames (empty, truncated, ROI collapsed) yield the same "no line"
    /// observation rather than an error.
    pub fn detect(&mut self, frame: &Frame) -> LineObservation {
        let width = frame.width as usize;
        let height = frame.height as usize;

        let roi_top = (frame.height as f32 * ROI_RATIO) as u32;
        let roi_bottom = frame.height.saturating_sub(BOTTOM_MARGIN);
        self.roi = RoiBounds {
            top: roi_top,
            bottom: roi_bottom,
        };

        let no_line = LineObservation {
            centroid_x: None,
            frame_width: frame.width,
            coverage: 0.0,
        };
        if width == 0 || roi_top >= roi_bottom {
            self.roi_mask.clear();
            return no_line;
        }

        to_grayscale_into(frame, &mut self.gray);
        if self.gray.len() != width * height {
            // Truncated pixel data; treat as no line rather than guessing.
            self.roi_mask.clear();
            return no_line;
        }

        gaussian_blur_into(&self.gray, width, height, &mut self.tmp_a, &mut self.blurred);
        threshold_inv_into(&self.blurred, INTENSITY_THRESHOLD, &mut self.mask);
        close_rect_into(
            &self.mask,
            width,
            height,
            CLOSE_KERNEL,
            &mut self.tmp_a,
            &mut self.tmp_b,
            &mut self.closed,
        );

        let roi_h = (roi_bottom - roi_top) as usize;
        self.roi_mask.clear();
        self.roi_mask
            .extend_from_slice(&self.closed[roi_top as usize * width..roi_bottom as usize * width]);

        // First-order moments give the horizontal mass center.
        let mut mass: u64 = 0;
        let mut moment_x: u64 = 0;
        for row in self.roi_mask.chunks_exact(width) {
            for (x, &v) in row.iter().enumerate() {
                if v != 0 {
                    mass += 1;
                    moment_x += x as u64;
                }
            }
        }
        let centroid_x = if mass > 0 {
            Some((moment_x / mass) as u32)
        } else {
            None
        };

        let contours = find_external_contours(&self.roi_mask, width, roi_h);
        let line_area: f64 = contours.iter().map(|c| c.area()).sum();
        let coverage = (line_area / (width * roi_h) as f64) as f32;

        LineObservation {
            centroid_x,
            frame_width: frame.width,
            coverage,
        }
    }

    /// Post-close ROI mask and bounds from the most recent `detect`.
    pub fn roi_view(&self) -> (&[u8], RoiBounds) {
        (&self.roi_mask, self.roi)
    }
}
