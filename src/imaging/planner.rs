//! Compression planning: source info + request → [`CompressPlan`].
//!
//! A plan is computed once per request, handed to the backend and dropped.
//! It holds no resources, so planning is safe to call from any thread.

use super::calculations::{
    compute_scale_ratio, decide_fast_path, fit_target_size, normalize_rotation,
    rotated_bounds,
};
use super::params::{CompressRequest, SourceImageInfo};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
}

/// The geometry and encode decisions for one compression request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressPlan {
    /// Ratio in `(0, 1]` applied to both source axes.
    pub scale_ratio: f64,
    pub target_width: u32,
    pub target_height: u32,
    /// Copy the source container instead of re-encoding.
    pub fast_path: bool,
    /// Rotation in `0..360`; 0 means no transform.
    pub rotation: u32,
}

impl CompressPlan {
    /// Longest target edge.
    pub fn max_edge(&self) -> u32 {
        self.target_width.max(self.target_height)
    }

    pub fn needs_rotation(&self) -> bool {
        self.rotation != 0
    }

    /// Final canvas after rotation.
    pub fn output_canvas(&self) -> (u32, u32) {
        rotated_bounds(self.target_width, self.target_height, self.rotation)
    }
}

/// Plan a compression: validate → scale ratio → target size → rotation →
/// fast path.
///
/// # Examples
/// ```
/// # use pixpress::imaging::{build_plan, CompressRequest, SourceFormat, SourceImageInfo};
/// let source = SourceImageInfo::new(4000, 3000, SourceFormat::Jpeg);
/// let plan = build_plan(&source, &CompressRequest::default()).unwrap();
/// assert_eq!((plan.target_width, plan.target_height), (1920, 1440));
/// assert!(!plan.fast_path);
/// ```
pub fn build_plan(
    source: &SourceImageInfo,
    request: &CompressRequest,
) -> Result<CompressPlan, PlanError> {
    let sample = request.sample_size();
    let scale_ratio = compute_scale_ratio(
        source.width,
        source.height,
        request.min_width,
        request.min_height,
    )?;
    let (target_width, target_height) = fit_target_size(
        source.width,
        source.height,
        request.min_width,
        request.min_height,
        sample,
    )?;
    let rotation = normalize_rotation(request.rotate);
    let fast_path = decide_fast_path(request.format, rotation, scale_ratio, sample);

    Ok(CompressPlan {
        scale_ratio,
        target_width,
        target_height,
        fast_path,
        rotation,
    })
}
