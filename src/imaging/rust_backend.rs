//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | EXIF orientation | `kamadak-exif` + `image` flips/quarter turns |
//! | Rotate (quarter turns) | `image::DynamicImage::rotate90/180/270` |
//! | Rotate (any angle) | bilinear sampling onto a transparent canvas |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Metadata blocks | [`metadata`](super::metadata) segment copier |
//!
//! HEIC has no pure Rust codec; both directions report
//! [`BackendError::UnsupportedFormat`].

use super::backend::{BackendError, ImageBackend};
use super::calculations::rotated_bounds;
use super::metadata::{self, SourceMetadata};
use super::params::{OutputFormat, Quality, RenderParams, SourceFormat, SourceImageInfo};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageError, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e) => BackendError::Io(e),
        ImageError::Unsupported(e) => BackendError::UnsupportedFormat(e.to_string()),
        other => BackendError::Decode(other.to_string()),
    }
}

fn reject_heic(data: &[u8]) -> Result<(), BackendError> {
    if SourceFormat::detect(data) == SourceFormat::Heic {
        return Err(BackendError::UnsupportedFormat(
            "HEIC input is not supported".to_string(),
        ));
    }
    Ok(())
}

/// Decode an encoded image held in memory.
fn load_image(data: &[u8]) -> Result<DynamicImage, BackendError> {
    reject_heic(data)?;
    image::load_from_memory(data).map_err(decode_error)
}

/// Bake an EXIF orientation (1-8) into the pixels.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Rotate clockwise by `angle` degrees (`0..360`).
fn rotate(img: DynamicImage, angle: u32) -> DynamicImage {
    match angle {
        0 => img,
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => DynamicImage::ImageRgba8(rotate_about_center(&img.to_rgba8(), angle)),
    }
}

/// Rotate around the centre onto a canvas sized to the rotated bounds.
///
/// Each output pixel is mapped back into the source and bilinearly sampled;
/// samples outside the source are transparent.
fn rotate_about_center(src: &RgbaImage, angle: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    let (cw, ch) = rotated_bounds(sw, sh, angle);
    let radians = (angle as f64).to_radians();
    let (sin, cos) = radians.sin_cos();

    let (src_cx, src_cy) = (sw as f64 / 2.0, sh as f64 / 2.0);
    let (dst_cx, dst_cy) = (cw as f64 / 2.0, ch as f64 / 2.0);

    RgbaImage::from_fn(cw, ch, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // Inverse of a clockwise turn (y axis points down)
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(src, sx, sy)
    })
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let pixel = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || py < 0 || px >= w || py >= h {
            return [0.0; 4];
        }
        let p = src.get_pixel(px as u32, py as u32).0;
        [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
    };

    let taps = [
        (pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (pixel(x0 + 1, y0), fx * (1.0 - fy)),
        (pixel(x0, y0 + 1), (1.0 - fx) * fy),
        (pixel(x0 + 1, y0 + 1), fx * fy),
    ];

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let v: f64 = taps.iter().map(|(p, weight)| p[c] * weight).sum();
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Encode to the requested container.
fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            // The encoder rejects 0; 1 is the lowest it accepts
            let q = quality.value().clamp(1, 100) as u8;
            JpegEncoder::new_with_quality(&mut buf, q).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::Webp => {
            tracing::debug!("WebP is encoded lossless; quality ignored");
            let pixels = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            pixels.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
        OutputFormat::Heic => {
            return Err(BackendError::UnsupportedFormat(
                "HEIC output is not supported".to_string(),
            ));
        }
    };
    result.map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn probe(&self, data: &[u8]) -> Result<SourceImageInfo, BackendError> {
        reject_heic(data)?;
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(BackendError::Decode(
                "unrecognized image container".to_string(),
            ));
        }
        let (width, height) = reader.into_dimensions().map_err(decode_error)?;
        Ok(SourceImageInfo::new(width, height, SourceFormat::detect(data)))
    }

    fn read_metadata(
        &self,
        data: &[u8],
        source: &SourceImageInfo,
    ) -> Result<SourceMetadata, BackendError> {
        Ok(SourceMetadata {
            blocks: metadata::extract_blocks(data, source.format),
            orientation: metadata::read_orientation(data),
        })
    }

    fn render(&self, data: &[u8], params: &RenderParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(data)?;

        let resized = if (img.width(), img.height()) == (params.target_width, params.target_height)
        {
            img
        } else {
            img.resize_exact(params.target_width, params.target_height, FilterType::Lanczos3)
        };

        let oriented = match params.orientation {
            Some(orientation) => apply_orientation(resized, orientation),
            None => resized,
        };

        let rotated = rotate(oriented, params.rotation);
        encode(&rotated, params.format, params.quality)
    }
}
