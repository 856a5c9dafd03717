//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: probe, read_metadata, and render.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, statically
//! linked. Platform adapters that own a native codec stack implement the
//! same trait and reuse the planner unchanged.

use super::metadata::SourceMetadata;
use super::params::{RenderParams, SourceImageInfo};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode: {0}")]
    Decode(String),
    #[error("Failed to encode: {0}")]
    Encode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Trait for image processing backends.
///
/// Backends work on in-memory encoded bytes; file handling lives in
/// [`operations`](super::operations) so every backend gets the same atomic
/// write behaviour.
pub trait ImageBackend: Sync {
    /// Read dimensions and container without decoding pixels.
    fn probe(&self, data: &[u8]) -> Result<SourceImageInfo, BackendError>;

    /// Read orientation and the allow-listed metadata blocks.
    fn read_metadata(
        &self,
        data: &[u8],
        source: &SourceImageInfo,
    ) -> Result<SourceMetadata, BackendError>;

    /// Decode, resample, orient, rotate and encode; returns the encoded bytes.
    fn render(&self, data: &[u8], params: &RenderParams) -> Result<Vec<u8>, BackendError>;
}
