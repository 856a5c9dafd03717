//! Parameter types for compression requests.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between callers (CLI, batch processing, a plugin channel) and the
//! [`planner`](super::planner), which turns them into a
//! [`CompressPlan`](super::planner::CompressPlan) the backend executes.
//!
//! ## Types
//!
//! - [`OutputFormat`]: Target container. Wire codes are fixed: `0 = JPEG,
//!   1 = PNG, 2 = HEIC, 3 = WEBP`.
//! - [`SourceFormat`]: Container sniffed from the first bytes of a source.
//! - [`Quality`]: Lossy encoding quality (0–100, default 95). Clamped on construction.
//! - [`CompressRequest`]: Everything a caller can ask for, with its defaults.
//! - [`SourceImageInfo`]: Probed source dimensions and container.
//! - [`RenderParams`]: One full-path render, ready for the backend.

use super::calculations::rotated_bounds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container for a compressed image.
///
/// Deserializes from either the wire code or the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "FormatRepr")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Heic,
    Webp,
}

impl OutputFormat {
    /// Wire code used by plugin channels.
    pub fn code(self) -> u8 {
        match self {
            Self::Jpeg => 0,
            Self::Png => 1,
            Self::Heic => 2,
            Self::Webp => 3,
        }
    }

    /// Map a wire code back to a format. Unknown codes fall back to JPEG.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Png,
            2 => Self::Heic,
            3 => Self::Webp,
            _ => Self::Jpeg,
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Heic => "heic",
            Self::Webp => "webp",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormatRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<FormatRepr> for OutputFormat {
    type Error = String;

    fn try_from(repr: FormatRepr) -> Result<Self, Self::Error> {
        match repr {
            FormatRepr::Code(code) => Ok(Self::from_code(code)),
            FormatRepr::Name(name) => name.parse(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Heic => "heic",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "0" => Ok(Self::Jpeg),
            "png" | "1" => Ok(Self::Png),
            "heic" | "heif" | "2" => Ok(Self::Heic),
            "webp" | "3" => Ok(Self::Webp),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Container of a source image, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Webp,
    Heic,
    Tiff,
    Unknown,
}

impl SourceFormat {
    /// Detect the container from the leading bytes of an encoded image.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8]) {
            Self::Jpeg
        } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            Self::Png
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Self::Webp
        } else if data.len() >= 12 && &data[4..8] == b"ftyp" {
            Self::Heic
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Self::Tiff
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Heic => "heic",
            Self::Tiff => "tiff",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "u32")]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, 100) as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

impl From<i64> for Quality {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

pub const DEFAULT_MIN_WIDTH: u32 = 1920;
pub const DEFAULT_MIN_HEIGHT: u32 = 1080;

/// A single compression request.
///
/// Field names deserialize from the camelCase argument map a plugin channel
/// sends (`minWidth`, `keepExif`, `inSampleSize`, ...). Missing fields take
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressRequest {
    /// Width of the minimum bounding box.
    pub min_width: u32,
    /// Height of the minimum bounding box.
    pub min_height: u32,
    /// Coarse decode divisor. Values below 1 are treated as 1.
    pub in_sample_size: u32,
    /// Rotation in degrees, any integer.
    pub rotate: i32,
    pub quality: Quality,
    pub format: OutputFormat,
    pub keep_exif: bool,
    /// Bake the source's EXIF orientation into the pixels.
    #[serde(alias = "autoCorrectionAngle")]
    pub auto_correction: bool,
}

impl Default for CompressRequest {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            in_sample_size: 1,
            rotate: 0,
            quality: Quality::default(),
            format: OutputFormat::Jpeg,
            keep_exif: false,
            auto_correction: true,
        }
    }
}

impl CompressRequest {
    /// Sample size with the lower bound applied.
    pub fn sample_size(&self) -> u32 {
        self.in_sample_size.max(1)
    }
}

/// Source pixel dimensions and container, probed without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
}

impl SourceImageInfo {
    pub fn new(width: u32, height: u32, format: SourceFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

/// Parameters for one decode → resize → orient → rotate → encode pass.
///
/// Built by [`plan_render`](super::operations::plan_render) from a plan and a
/// request; the backend executes it without further decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    /// Pixel size after resampling, before orientation and rotation. A source
    /// already at this size is not resampled.
    pub target_width: u32,
    pub target_height: u32,
    /// Degrees in `0..360`, clockwise, applied after orientation.
    pub rotation: u32,
    /// EXIF orientation (2-8) to bake into the pixels; `None` leaves them as stored.
    pub orientation: Option<u32>,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl RenderParams {
    /// Pixel size of the encoded result.
    ///
    /// Orientations 5-8 transpose the resampled image before `rotation` is
    /// applied.
    pub fn output_canvas(&self) -> (u32, u32) {
        let (w, h) = match self.orientation {
            Some(5..=8) => (self.target_height, self.target_width),
            _ => (self.target_width, self.target_height),
        };
        rotated_bounds(w, h, self.rotation)
    }
}
