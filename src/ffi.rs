//! C ABI for the planner.
//!
//! Platform adapters that keep their own codec stack link the `staticlib`
//! and call [`pixpress_build_plan`] so every platform scales, rotates and
//! picks the fast path identically.
//!
//! ```c
//! typedef struct {
//!     int32_t  status;        /* 0 = ok, 1 = invalid dimensions */
//!     double   scale_ratio;
//!     uint32_t target_width;
//!     uint32_t target_height;
//!     bool     fast_path;
//!     uint32_t rotation;
//! } PixpressPlan;
//!
//! PixpressPlan pixpress_build_plan(int64_t src_w, int64_t src_h,
//!                                  int64_t min_w, int64_t min_h,
//!                                  int64_t sample, int64_t rotate,
//!                                  int64_t format);
//! ```

use crate::imaging::{CompressRequest, OutputFormat, Quality, SourceFormat, SourceImageInfo, build_plan};

pub const PIXPRESS_OK: i32 = 0;
pub const PIXPRESS_INVALID_DIMENSIONS: i32 = 1;

/// Plan returned across the C boundary. Fields other than `status` are
/// zeroed when `status != PIXPRESS_OK`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixpressPlan {
    pub status: i32,
    pub scale_ratio: f64,
    pub target_width: u32,
    pub target_height: u32,
    pub fast_path: bool,
    pub rotation: u32,
}

impl PixpressPlan {
    fn invalid() -> Self {
        Self {
            status: PIXPRESS_INVALID_DIMENSIONS,
            scale_ratio: 0.0,
            target_width: 0,
            target_height: 0,
            fast_path: false,
            rotation: 0,
        }
    }
}

/// Positive and representable as `u32`.
fn dimension(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|&v| v > 0)
}

/// Plan a compression from plain integers.
///
/// `format` uses the wire codes (`0 = JPEG, 1 = PNG, 2 = HEIC, 3 = WEBP`);
/// unknown codes mean JPEG. `sample` below 1 means 1. Any dimension that is
/// zero, negative or wider than 32 bits yields `PIXPRESS_INVALID_DIMENSIONS`.
#[unsafe(no_mangle)]
pub extern "C" fn pixpress_build_plan(
    src_w: i64,
    src_h: i64,
    min_w: i64,
    min_h: i64,
    sample: i64,
    rotate: i64,
    format: i64,
) -> PixpressPlan {
    let (Some(sw), Some(sh), Some(mw), Some(mh)) = (
        dimension(src_w),
        dimension(src_h),
        dimension(min_w),
        dimension(min_h),
    ) else {
        tracing::debug!(src_w, src_h, min_w, min_h, "rejected dimensions at C boundary");
        return PixpressPlan::invalid();
    };

    let request = CompressRequest {
        min_width: mw,
        min_height: mh,
        in_sample_size: sample.clamp(1, u32::MAX as i64) as u32,
        // Reduce first so the i32 field cannot overflow
        rotate: rotate.rem_euclid(360) as i32,
        quality: Quality::default(),
        format: OutputFormat::from_code(format),
        keep_exif: false,
        auto_correction: true,
    };

    match build_plan(&SourceImageInfo::new(sw, sh, SourceFormat::Unknown), &request) {
        Ok(plan) => PixpressPlan {
            status: PIXPRESS_OK,
            scale_ratio: plan.scale_ratio,
            target_width: plan.target_width,
            target_height: plan.target_height,
            fast_path: plan.fast_path,
            rotation: plan.rotation,
        },
        Err(_) => PixpressPlan::invalid(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_large_landscape() {
        let plan = pixpress_build_plan(4000, 3000, 1920, 1080, 1, 0, 0);
        assert_eq!(plan.status, PIXPRESS_OK);
        assert_eq!(plan.scale_ratio, 0.48);
        assert_eq!((plan.target_width, plan.target_height), (1920, 1440));
        assert!(!plan.fast_path);
    }

    #[test]
    fn full_turn_jpeg_is_fast() {
        let plan = pixpress_build_plan(800, 600, 1920, 1080, 1, 360, 0);
        assert_eq!(plan.rotation, 0);
        assert!(plan.fast_path);
    }

    #[test]
    fn png_code_is_never_fast() {
        let plan = pixpress_build_plan(800, 600, 1920, 1080, 1, 0, 1);
        assert!(!plan.fast_path);
    }

    #[test]
    fn unknown_format_code_is_jpeg() {
        let plan = pixpress_build_plan(800, 600, 1920, 1080, 1, 0, 42);
        assert!(plan.fast_path);
    }

    #[test]
    fn negative_rotation_wraps() {
        let plan = pixpress_build_plan(800, 600, 1920, 1080, 1, -90, 0);
        assert_eq!(plan.rotation, 270);
        let plan = pixpress_build_plan(800, 600, 1920, 1080, 1, i64::MIN, 0);
        assert!(plan.rotation < 360);
    }

    #[test]
    fn sample_below_one_is_one() {
        let plan = pixpress_build_plan(800, 600, 1920, 1080, -3, 0, 0);
        assert_eq!((plan.target_width, plan.target_height), (800, 600));
        assert!(plan.fast_path);
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        for (sw, sh, mw, mh) in [
            (0, 600, 1920, 1080),
            (800, -1, 1920, 1080),
            (800, 600, 0, 1080),
            (800, 600, 1920, -5),
            (i64::from(u32::MAX) + 1, 600, 1920, 1080),
        ] {
            let plan = pixpress_build_plan(sw, sh, mw, mh, 1, 0, 0);
            assert_eq!(plan.status, PIXPRESS_INVALID_DIMENSIONS, "{sw}x{sh} in {mw}x{mh}");
            assert_eq!(plan.target_width, 0);
        }
    }
}
