//! Image compression: planning plus a pure Rust codec backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Plan** | [`build_plan`] (pure arithmetic, no I/O) |
//! | **Probe** | `image::ImageReader::into_dimensions` |
//! | **Orientation** | `kamadak-exif` |
//! | **Metadata blocks** | custom segment copier (JPEG APP0/APP1/APP13, PNG eXIf) |
//! | **Resize → encode** | Lanczos3 + `image` JPEG / PNG / WebP encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Planner**: [`build_plan`] composing the calculations into a [`CompressPlan`]
//! - **Parameters**: Data structures describing requests and renders
//! - **Metadata**: Allow-listed block extraction and re-insertion
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining the planner + backend

pub mod backend;
mod calculations;
pub mod metadata;
pub mod operations;
mod params;
mod planner;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    FAST_PATH_SCALE_TOLERANCE, compute_scale_ratio, compute_target_size, decide_fast_path,
    fit_target_size, normalize_rotation, rotated_bounds,
};
pub use operations::{
    CompressError, CompressOutcome, Compressed, compress_bytes, compress_file, plan_source,
};
pub use params::{
    CompressRequest, DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH, OutputFormat, Quality, RenderParams,
    SourceFormat, SourceImageInfo,
};
pub use planner::{CompressPlan, PlanError, build_plan};
pub use rust_backend::RustBackend;
