//! Proportional steering and speed-reduction-on-error throttle policy.

use super::command::{MAX_FORWARD_THROTTLE, STEER_LIMIT};

/// Proportional steering gain applied to the pixel error.
pub const STEER_GAIN: f64 = 7.5;
/// Fraction of the throttle ceiling used in autonomous driving.
pub const AUTO_THROTTLE_SCALE: f64 = 0.1;
/// Smallest non-zero forward throttle ever commanded.
pub const MIN_FORWARD_THROTTLE: i32 = 1;

/// Compute a steering/throttle pair from the line centroid.
///
/// Steering is proportional to the centroid's offset from the frame midpoint
/// (line right of center steers left). Throttle shrinks linearly as the
/// offset grows, reaching zero at the frame edge; any positive throttle is
/// rounded up and floored at [`MIN_FORWARD_THROTTLE`] so the vehicle creeps
/// forward instead of stalling on rounding.
///
/// # Arguments
/// * `centroid_x` - Horizontal line position in pixels, `[0, width)`
/// * `width` - Frame width in pixels
///
/// # Returns
/// `(steer, throttle)` with steer in [-100, 100] and throttle in
/// [0, MAX_FORWARD_THROTTLE].
pub fn compute(centroid_x: u32, width: u32) -> (i32, i32) {
    if width == 0 {
        return (0, 0);
    }

    let error = centroid_x as i64 - (width / 2) as i64;
    let steer = (-STEER_GAIN * error as f64).clamp(-(STEER_LIMIT as f64), STEER_LIMIT as f64) as i32;

    let norm_error = (error.abs() as f64 / (width as f64 / 2.0)).min(1.0);
    let base = (1.0 - norm_error) * MAX_FORWARD_THROTTLE as f64;
    let scaled = base * AUTO_THROTTLE_SCALE;

    let throttle = if scaled > 0.0 {
        (scaled.ceil() as i32).max(MIN_FORWARD_THROTTLE)
    } else {
        0
    };

    (steer, throttle)
}
