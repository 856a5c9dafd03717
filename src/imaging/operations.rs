//! High-level compression operations.
//!
//! These functions combine planning with backend execution. They probe the
//! source, build a [`CompressPlan`], take the fast or full path, and carry
//! allow-listed metadata across.

use super::backend::{BackendError, ImageBackend};
use super::metadata::{self, MetadataBlocks};
use super::params::{CompressRequest, OutputFormat, RenderParams, SourceFormat, SourceImageInfo};
use super::planner::{CompressPlan, PlanError, build_plan};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Source is empty")]
    EmptySource,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CompressError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptySource | Self::Plan(_) => "invalid_source",
            Self::Read { .. } | Self::Backend(BackendError::Io(_)) => "read_error",
            Self::Write { .. } => "write_error",
            Self::Backend(BackendError::Decode(_)) => "decode_error",
            Self::Backend(BackendError::Encode(_)) => "encode_error",
            Self::Backend(BackendError::UnsupportedFormat(_)) => "unsupported_format",
        }
    }
}

/// Result type for compression operations.
pub type Result<T> = std::result::Result<T, CompressError>;

/// One finished compression.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub source: SourceImageInfo,
    pub plan: CompressPlan,
    /// Pixel size of `data`. Differs from the plan's canvas when an EXIF
    /// orientation transposed the image.
    pub output_size: (u32, u32),
    pub data: Vec<u8>,
}

/// What a file compression did, without the encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOutcome {
    pub source: SourceImageInfo,
    pub plan: CompressPlan,
    pub output_size: (u32, u32),
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Probe a source and plan it without encoding anything.
pub fn plan_source(
    backend: &impl ImageBackend,
    data: &[u8],
    request: &CompressRequest,
) -> Result<(SourceImageInfo, CompressPlan)> {
    if data.is_empty() {
        return Err(CompressError::EmptySource);
    }
    let source = backend.probe(data)?;
    let plan = build_plan(&source, request)?;
    Ok((source, plan))
}

/// Build the full-path render parameters for a plan.
///
/// `orientation` is dropped unless the request asks for auto-correction.
pub fn plan_render(
    plan: &CompressPlan,
    request: &CompressRequest,
    orientation: Option<u32>,
) -> RenderParams {
    RenderParams {
        target_width: plan.target_width,
        target_height: plan.target_height,
        rotation: plan.rotation,
        orientation: orientation.filter(|_| request.auto_correction),
        format: request.format,
        quality: request.quality,
    }
}

/// Compress an encoded image held in memory.
///
/// Fast path with a JPEG source: the bytes are returned unchanged (pixels
/// and every embedded block preserved). Fast path with any other source:
/// re-encoded at the source geometry. Otherwise the backend renders the
/// plan, and with `keep_exif` the allow-listed blocks are re-inserted.
pub fn compress_bytes(
    backend: &impl ImageBackend,
    data: &[u8],
    request: &CompressRequest,
) -> Result<Compressed> {
    let (source, plan) = plan_source(backend, data, request)?;
    debug!(
        width = source.width,
        height = source.height,
        format = ?source.format,
        ratio = plan.scale_ratio,
        target_width = plan.target_width,
        target_height = plan.target_height,
        rotation = plan.rotation,
        fast_path = plan.fast_path,
        "planned"
    );

    if plan.fast_path && source.format == SourceFormat::Jpeg {
        debug!("fast path: copying source bytes");
        return Ok(Compressed {
            source,
            plan,
            output_size: (source.width, source.height),
            data: data.to_vec(),
        });
    }

    let wants_metadata = request.keep_exif || request.auto_correction;
    let meta = if wants_metadata {
        backend.read_metadata(data, &source)?
    } else {
        Default::default()
    };

    let params = plan_render(&plan, request, meta.orientation);
    let rendered = backend.render(data, &params)?;

    let data = if request.keep_exif {
        propagate_metadata(rendered, meta.blocks, request.format)
    } else {
        rendered
    };

    Ok(Compressed {
        source,
        plan,
        output_size: params.output_canvas(),
        data,
    })
}

/// Re-insert allow-listed blocks into rendered output.
fn propagate_metadata(rendered: Vec<u8>, mut blocks: MetadataBlocks, format: OutputFormat) -> Vec<u8> {
    if blocks.is_empty() {
        return rendered;
    }
    if format != OutputFormat::Jpeg {
        warn!(%format, "metadata is only carried into JPEG output; dropped");
        return rendered;
    }
    if let Some(exif) = blocks.exif.as_mut() {
        if metadata::reset_orientation(exif) {
            debug!("orientation reset to upright");
        }
    }
    metadata::insert_into_jpeg(&rendered, &blocks)
}

/// Compress a file on disk into `output`.
///
/// The output is written to a temporary sibling and persisted only once
/// encoding succeeded, so a failure never leaves a partial file behind.
pub fn compress_file(
    backend: &impl ImageBackend,
    input: &Path,
    output: &Path,
    request: &CompressRequest,
) -> Result<CompressOutcome> {
    let data = std::fs::read(input).map_err(|source| CompressError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let compressed = compress_bytes(backend, &data, request)?;
    write_atomic(output, &compressed.data)?;

    Ok(CompressOutcome {
        source: compressed.source,
        plan: compressed.plan,
        output_size: compressed.output_size,
        bytes_in: data.len() as u64,
        bytes_out: compressed.data.len() as u64,
    })
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| CompressError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
