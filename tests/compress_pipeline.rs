//! End-to-end tests through the public API with the pure Rust backend.
//!
//! Images are synthesized with the `image` crate, so no fixtures are needed.
//!
//! Run with: cargo test --test compress_pipeline

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbImage};
use pixpress::ffi::{PIXPRESS_OK, pixpress_build_plan};
use pixpress::imaging::metadata::{self, MetadataBlocks};
use pixpress::imaging::{
    CompressError, CompressRequest, OutputFormat, RustBackend, SourceFormat, compress_bytes,
    compress_file, plan_source,
};
use pixpress::process::{collect_jobs, run_batch};
use std::fs;
use tempfile::TempDir;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    })
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_with_encoder(PngEncoder::new(&mut buf))
        .unwrap();
    buf
}

/// Little-endian TIFF with a single IFD0 entry: orientation.
fn exif_with_orientation(orientation: u16) -> Vec<u8> {
    let mut payload = b"Exif\0\0II\x2a\x00\x08\x00\x00\x00".to_vec();
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&0x0112u16.to_le_bytes());
    payload.extend_from_slice(&3u16.to_le_bytes());
    payload.extend_from_slice(&1u32.to_le_bytes());
    payload.extend_from_slice(&orientation.to_le_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_le_bytes());
    payload
}

fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let blocks = MetadataBlocks {
        exif: Some(exif_with_orientation(orientation)),
        ..MetadataBlocks::default()
    };
    metadata::insert_into_jpeg(&jpeg(width, height), &blocks)
}

fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

fn request(min_width: u32, min_height: u32) -> CompressRequest {
    CompressRequest {
        min_width,
        min_height,
        ..CompressRequest::default()
    }
}

// ============================================================================
// Single image
// ============================================================================

#[test]
fn small_jpeg_is_copied_verbatim() {
    let source = jpeg(80, 60);
    let out = compress_bytes(&RustBackend::new(), &source, &request(1920, 1080)).unwrap();

    assert!(out.plan.fast_path);
    assert_eq!(out.data, source);
}

#[test]
fn large_jpeg_is_scaled_to_plan() {
    let source = jpeg(400, 300);
    let out = compress_bytes(&RustBackend::new(), &source, &request(192, 108)).unwrap();

    assert!(!out.plan.fast_path);
    assert_eq!((out.plan.target_width, out.plan.target_height), (192, 144));
    assert_eq!(dimensions(&out.data), (192, 144));
    assert_eq!(out.output_size, (192, 144));
    assert_eq!(SourceFormat::detect(&out.data), SourceFormat::Jpeg);
}

#[test]
fn quarter_turn_swaps_output_axes() {
    let req = CompressRequest {
        rotate: 90,
        ..request(1920, 1080)
    };
    let out = compress_bytes(&RustBackend::new(), &jpeg(64, 48), &req).unwrap();

    assert_eq!(out.plan.output_canvas(), (48, 64));
    assert_eq!(dimensions(&out.data), (48, 64));
}

#[test]
fn png_output_from_png_source() {
    let req = CompressRequest {
        format: OutputFormat::Png,
        ..request(1920, 1080)
    };
    let out = compress_bytes(&RustBackend::new(), &png(32, 24), &req).unwrap();

    assert!(!out.plan.fast_path);
    assert_eq!(SourceFormat::detect(&out.data), SourceFormat::Png);
    assert_eq!(dimensions(&out.data), (32, 24));
}

#[test]
fn webp_output_is_decodable() {
    let req = CompressRequest {
        format: OutputFormat::Webp,
        ..request(1920, 1080)
    };
    let out = compress_bytes(&RustBackend::new(), &jpeg(32, 24), &req).unwrap();

    assert_eq!(SourceFormat::detect(&out.data), SourceFormat::Webp);
    assert_eq!(dimensions(&out.data), (32, 24));
}

#[test]
fn heic_output_is_unsupported() {
    let req = CompressRequest {
        format: OutputFormat::Heic,
        ..request(1920, 1080)
    };
    let err = compress_bytes(&RustBackend::new(), &jpeg(32, 24), &req).unwrap_err();
    assert_eq!(err.code(), "unsupported_format");
}

#[test]
fn garbage_input_is_a_decode_error() {
    let err = compress_bytes(&RustBackend::new(), b"not an image", &request(10, 10)).unwrap_err();
    assert_eq!(err.code(), "decode_error");
}

#[test]
fn empty_input_is_rejected() {
    let err = compress_bytes(&RustBackend::new(), &[], &request(10, 10)).unwrap_err();
    assert!(matches!(err, CompressError::EmptySource));
}

#[test]
fn plan_source_reads_header_only() {
    let (source, plan) = plan_source(&RustBackend::new(), &jpeg(400, 300), &request(100, 100)).unwrap();
    assert_eq!((source.width, source.height), (400, 300));
    assert_eq!(source.format, SourceFormat::Jpeg);
    assert!(plan.scale_ratio < 1.0);
}

// ============================================================================
// Orientation and metadata
// ============================================================================

#[test]
fn orientation_is_applied_and_reset_when_keeping_exif() {
    let source = jpeg_with_orientation(400, 300, 6);
    let req = CompressRequest {
        keep_exif: true,
        ..request(100, 100)
    };
    let out = compress_bytes(&RustBackend::new(), &source, &req).unwrap();

    // Orientation 6 is a quarter turn, so the stored axes swap
    assert_eq!(
        dimensions(&out.data),
        (out.plan.target_height, out.plan.target_width)
    );
    assert_eq!(out.output_size, dimensions(&out.data));
    assert!(metadata::extract_blocks(&out.data, SourceFormat::Jpeg).exif.is_some());
    assert_eq!(metadata::read_orientation(&out.data), None);
}

#[test]
fn orientation_is_ignored_without_auto_correction() {
    let source = jpeg_with_orientation(400, 300, 6);
    let req = CompressRequest {
        auto_correction: false,
        ..request(100, 100)
    };
    let out = compress_bytes(&RustBackend::new(), &source, &req).unwrap();

    assert_eq!(
        dimensions(&out.data),
        (out.plan.target_width, out.plan.target_height)
    );
}

#[test]
fn exif_is_dropped_by_default() {
    let source = jpeg_with_orientation(400, 300, 1);
    let out = compress_bytes(&RustBackend::new(), &source, &request(100, 100)).unwrap();
    assert!(metadata::extract_blocks(&out.data, SourceFormat::Jpeg).exif.is_none());
}

// ============================================================================
// Files and batches
// ============================================================================

#[test]
fn compress_file_creates_parent_directories() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in.jpg");
    let output = tmp.path().join("nested/deeper/out.jpg");
    fs::write(&input, jpeg(400, 300)).unwrap();

    let outcome = compress_file(&RustBackend::new(), &input, &output, &request(100, 100)).unwrap();

    assert_eq!(outcome.bytes_out, fs::metadata(&output).unwrap().len());
    assert_eq!(outcome.bytes_in, fs::metadata(&input).unwrap().len());
    assert_eq!(SourceFormat::detect(&fs::read(&output).unwrap()), SourceFormat::Jpeg);
}

#[test]
fn missing_input_file_is_a_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = compress_file(
        &RustBackend::new(),
        &tmp.path().join("absent.jpg"),
        &tmp.path().join("out.jpg"),
        &request(100, 100),
    )
    .unwrap_err();
    assert_eq!(err.code(), "read_error");
}

#[test]
fn batch_compresses_tree_and_reports_failures() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photos");
    let output = tmp.path().join("out");
    fs::create_dir_all(input.join("scans")).unwrap();
    fs::write(input.join("a.jpg"), jpeg(400, 300)).unwrap();
    fs::write(input.join("scans/b.png"), png(60, 40)).unwrap();
    fs::write(input.join("broken.jpg"), b"truncated").unwrap();
    fs::write(input.join("notes.txt"), b"not an image").unwrap();
    fs::write(input.join(".hidden.jpg"), jpeg(10, 10)).unwrap();

    let req = request(100, 100);
    let jobs = collect_jobs(&input, &output, req.format).unwrap();
    assert_eq!(jobs.len(), 3);

    let mut events = 0;
    let report = run_batch(&RustBackend::new(), &jobs, &req, 2, |_| events += 1).unwrap();

    assert_eq!(events, 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(output.join("a.jpg").is_file());
    assert!(output.join("scans/b.jpg").is_file());
    assert!(!output.join("broken.jpg").exists());
    assert!(!output.join(".hidden.jpg").exists());
}

// ============================================================================
// C ABI
// ============================================================================

#[test]
fn limiting_axis_reaches_box_edge() {
    // 2148 wide: the f64 ratio 1920/2148 floors to 1919 without exact sizing
    let source = jpeg(2148, 40);
    let out = compress_bytes(&RustBackend::new(), &source, &request(1920, 10)).unwrap();
    assert_eq!(out.plan.target_width, 1920);
    assert_eq!(dimensions(&out.data).0, 1920);
}

#[test]
fn ffi_plan_matches_native_plan() {
    let (_, native) = plan_source(&RustBackend::new(), &jpeg(400, 300), &request(192, 108)).unwrap();
    let ffi = pixpress_build_plan(400, 300, 192, 108, 1, 0, 0);

    assert_eq!(ffi.status, PIXPRESS_OK);
    assert_eq!(ffi.scale_ratio, native.scale_ratio);
    assert_eq!((ffi.target_width, ffi.target_height), (native.target_width, native.target_height));
    assert_eq!(ffi.fast_path, native.fast_path);
}
