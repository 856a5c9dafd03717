//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Plan
//!
//! Machine-readable JSON:
//!
//! ```text
//! {
//!   "source": { "width": 4000, "height": 3000, "format": "jpeg" },
//!   "plan": { "scale_ratio": 0.48, "target_width": 1920, ... },
//!   "canvas": [1920, 1440]
//! }
//! ```
//!
//! ## Compress
//!
//! ```text
//! dawn.jpg → out/dawn.jpg
//!     Source: 4000x3000 jpeg, 4.2 MB
//!     Output: 1920x1440 (ratio 0.480), 612.3 KB
//!     Path: full
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 dawn.jpg → out/dawn.jpg
//!     4000x3000 → 1920x1440, 4.2 MB → 612.3 KB
//! 002 broken.jpg FAILED [decode_error] Failed to decode: ...
//!
//! Compressed 1 of 2 images (1 failed), 4.2 MB → 612.3 KB
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{CompressOutcome, CompressPlan, SourceImageInfo};
use crate::process::{BatchEvent, BatchReport};
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count with one decimal (B, KB, MB, GB; base 1024).
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn path_label(plan: &CompressPlan) -> &'static str {
    if plan.fast_path { "fast" } else { "full" }
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Serialize)]
struct PlanReport<'a> {
    source: &'a SourceImageInfo,
    plan: &'a CompressPlan,
    canvas: (u32, u32),
}

/// Format a plan as pretty JSON.
pub fn format_plan_json(
    source: &SourceImageInfo,
    plan: &CompressPlan,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&PlanReport {
        source,
        plan,
        canvas: plan.output_canvas(),
    })
}

// ============================================================================
// Compress
// ============================================================================

/// Format the result of a single-file compression.
pub fn format_compress_output(input: &Path, output: &Path, outcome: &CompressOutcome) -> Vec<String> {
    let (w, h) = outcome.output_size;
    vec![
        format!("{} → {}", file_name(input), output.display()),
        format!(
            "    Source: {}x{} {}, {}",
            outcome.source.width,
            outcome.source.height,
            outcome.source.format,
            human_bytes(outcome.bytes_in)
        ),
        format!(
            "    Output: {}x{} (ratio {:.3}), {}",
            w,
            h,
            outcome.plan.scale_ratio,
            human_bytes(outcome.bytes_out)
        ),
        format!("    Path: {}", path_label(&outcome.plan)),
    ]
}

pub fn print_compress_output(input: &Path, output: &Path, outcome: &CompressOutcome) {
    for line in format_compress_output(input, output, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Compressed {
            index,
            source,
            output,
            outcome,
        } => {
            let (w, h) = outcome.output_size;
            vec![
                format!(
                    "{} {} → {}",
                    format_index(*index),
                    file_name(source),
                    output.display()
                ),
                format!(
                    "    {}x{} → {}x{}, {} → {}",
                    outcome.source.width,
                    outcome.source.height,
                    w,
                    h,
                    human_bytes(outcome.bytes_in),
                    human_bytes(outcome.bytes_out)
                ),
            ]
        }
        BatchEvent::Failed {
            index,
            source,
            code,
            message,
        } => vec![format!(
            "{} {} FAILED [{}] {}",
            format_index(*index),
            file_name(source),
            code,
            message
        )],
    }
}

pub fn print_batch_event(event: &BatchEvent) {
    for line in format_batch_event(event) {
        println!("{}", line);
    }
}

/// One-line summary of a finished batch.
pub fn format_batch_summary(report: &BatchReport) -> String {
    let total = report.jobs.len();
    if total == 0 {
        return "No images found".to_string();
    }
    let (bytes_in, bytes_out) = report.byte_totals();
    let failed = match report.failed() {
        0 => String::new(),
        n => format!(" ({} failed)", n),
    };
    format!(
        "Compressed {} of {} images{}, {} → {}",
        report.succeeded(),
        total,
        failed,
        human_bytes(bytes_in),
        human_bytes(bytes_out)
    )
}
