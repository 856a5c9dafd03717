//! Pure calculation functions for compression planning.
//!
//! All functions here are pure and testable without any I/O or images.
//! [`build_plan`](super::planner::build_plan) composes them in order.

use super::params::OutputFormat;
use super::planner::PlanError;

/// Scale ratio at or above which the source geometry counts as unchanged.
///
/// Tunable: the value only absorbs floating-point noise in the ratio and
/// carries no meaning beyond "effectively 1".
pub const FAST_PATH_SCALE_TOLERANCE: f64 = 0.9999;

/// Calculate the bounding-box fit ratio for a source image.
///
/// The limiting axis is chosen by comparing aspect ratios: a source that is
/// relatively narrower than the box is width-limited, otherwise it is
/// height-limited. The result is clamped to 1, so a source smaller than the
/// box is never enlarged.
///
/// # Examples
/// ```
/// # use pixpress::imaging::compute_scale_ratio;
/// // 4000x3000 into 1920x1080: 4:3 is narrower than 16:9 → width-limited
/// assert_eq!(compute_scale_ratio(4000, 3000, 1920, 1080).unwrap(), 0.48);
///
/// // Already smaller than the box → unscaled
/// assert_eq!(compute_scale_ratio(800, 600, 1920, 1080).unwrap(), 1.0);
/// ```
pub fn compute_scale_ratio(
    source_width: u32,
    source_height: u32,
    min_width: u32,
    min_height: u32,
) -> Result<f64, PlanError> {
    if source_width == 0 || source_height == 0 {
        return Err(PlanError::InvalidDimensions {
            width: source_width as i64,
            height: source_height as i64,
        });
    }
    if min_width == 0 || min_height == 0 {
        return Err(PlanError::InvalidDimensions {
            width: min_width as i64,
            height: min_height as i64,
        });
    }

    let ratio = if is_width_limited(source_width, source_height, min_width, min_height) {
        min_width as f64 / source_width as f64
    } else {
        min_height as f64 / source_height as f64
    };

    Ok(ratio.min(1.0))
}

/// `sw / sh < mw / mh`, compared without division.
fn is_width_limited(sw: u32, sh: u32, mw: u32, mh: u32) -> bool {
    (sw as u64) * (mh as u64) < (mw as u64) * (sh as u64)
}

/// Target pixel dimensions for fitting a source to a minimum box.
///
/// Same result as [`compute_scale_ratio`] followed by
/// [`compute_target_size`], but in exact integer arithmetic: the limiting
/// axis lands on the box edge (divided by the sample size) instead of one
/// pixel short when the ratio is not representable as `f64`.
///
/// # Examples
/// ```
/// # use pixpress::imaging::fit_target_size;
/// assert_eq!(fit_target_size(4000, 3000, 1920, 1080, 1).unwrap(), (1920, 1440));
/// assert_eq!(fit_target_size(2148, 100_000, 1920, 1080, 1).unwrap().0, 1920);
/// ```
pub fn fit_target_size(
    source_width: u32,
    source_height: u32,
    min_width: u32,
    min_height: u32,
    sample_size: u32,
) -> Result<(u32, u32), PlanError> {
    // Validates every dimension
    compute_scale_ratio(source_width, source_height, min_width, min_height)?;

    let (sw, sh) = (source_width as u64, source_height as u64);
    let sample = sample_size.max(1) as u64;

    // Scale by num / den, never above 1
    let (num, den) = if is_width_limited(source_width, source_height, min_width, min_height) {
        (min_width as u64, sw)
    } else {
        (min_height as u64, sh)
    };
    let (num, den) = if num >= den { (1, 1) } else { (num, den) };

    let axis = |side: u64| -> u32 { ((side * num) / (den * sample)).max(1) as u32 };
    Ok((axis(sw), axis(sh)))
}

/// Calculate target pixel dimensions from a scale ratio and sample divisor.
///
/// Floors rather than rounds so the result never exceeds what the ratio
/// allows. Each axis is at least 1 pixel.
pub fn compute_target_size(
    source_width: u32,
    source_height: u32,
    scale_ratio: f64,
    sample_size: u32,
) -> (u32, u32) {
    let sample = sample_size.max(1) as f64;
    let w = (source_width as f64 * scale_ratio / sample).floor();
    let h = (source_height as f64 * scale_ratio / sample).floor();
    ((w as u32).max(1), (h as u32).max(1))
}

/// Normalize any rotation in degrees into `0..360`.
pub fn normalize_rotation(angle_degrees: i32) -> u32 {
    angle_degrees.rem_euclid(360) as u32
}

/// Decide whether the request can skip decode → resize → encode.
///
/// True only for JPEG output with no rotation, no sampling, and a scale
/// ratio of effectively 1.
pub fn decide_fast_path(
    format: OutputFormat,
    normalized_angle: u32,
    scale_ratio: f64,
    sample_size: u32,
) -> bool {
    format == OutputFormat::Jpeg
        && normalized_angle == 0
        && scale_ratio >= FAST_PATH_SCALE_TOLERANCE
        && sample_size == 1
}

/// Canvas needed to hold an image rotated around its centre.
///
/// Quarter turns swap or keep the axes exactly; any other angle uses the
/// bounding box of the rotated rectangle, rounded up.
pub fn rotated_bounds(width: u32, height: u32, normalized_angle: u32) -> (u32, u32) {
    match normalized_angle {
        0 | 180 => (width, height),
        90 | 270 => (height, width),
        angle => {
            let radians = (angle as f64).to_radians();
            let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
            let (w, h) = (width as f64, height as f64);
            let rw = (w * cos + h * sin).ceil() as u32;
            let rh = (w * sin + h * cos).ceil() as u32;
            (rw.max(1), rh.max(1))
        }
    }
}
