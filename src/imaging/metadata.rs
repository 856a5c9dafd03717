//! Metadata allow-list: which blocks survive compression, and how.
//!
//! Only these blocks are carried from source to output when `keep_exif` is
//! set:
//!
//! | Block | Source container | Carries |
//! |---|---|---|
//! | JFIF | JPEG APP0 | density / units |
//! | EXIF | JPEG APP1 `Exif\0\0`, PNG `eXIf` | TIFF IFD0, EXIF and GPS sub-IFDs |
//! | IPTC | JPEG APP13 `Photoshop 3.0` | IPTC-IIM records |
//!
//! Pixels are rotated before encoding, so the orientation tag (0x0112) in
//! IFD0 is rewritten to 1 (upright) before the block is re-inserted.
//! Orientation *reading* goes through `kamadak-exif`; the blocks themselves
//! are copied byte-for-byte.
//!
//! Blocks are re-inserted into JPEG output only. Other containers leave the
//! encoder's output untouched.

use super::params::SourceFormat;
use std::io::Cursor;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const JFIF_HEADER: &[u8] = b"JFIF\0";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

const TAG_ORIENTATION: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Largest payload a single JPEG marker segment can hold.
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// Allow-listed metadata blocks lifted from a source image.
///
/// Each field holds the segment payload *after* the JPEG length field, with
/// its identifying header (`JFIF\0`, `Exif\0\0`, `Photoshop 3.0\0`) intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBlocks {
    pub jfif: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
}

impl MetadataBlocks {
    pub fn is_empty(&self) -> bool {
        self.jfif.is_none() && self.exif.is_none() && self.iptc.is_none()
    }
}

/// Metadata the pipeline needs from a source: allow-listed blocks and the
/// EXIF orientation (1-8), if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    pub blocks: MetadataBlocks,
    pub orientation: Option<u32>,
}

/// Lift allow-listed blocks from an encoded source.
///
/// Unknown or malformed containers yield empty blocks rather than an error:
/// missing metadata never fails a compression.
pub fn extract_blocks(data: &[u8], format: SourceFormat) -> MetadataBlocks {
    match format {
        SourceFormat::Jpeg => extract_from_jpeg(data),
        SourceFormat::Png => extract_from_png(data),
        _ => MetadataBlocks::default(),
    }
}

/// Read the EXIF orientation tag from any container `kamadak-exif` knows.
///
/// Returns `None` when absent or outside `2..=8` (1 means upright already).
pub fn read_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).filter(|o| (2..=8).contains(o))
}

// ---------------------------------------------------------------------------
// JPEG segment walking
// ---------------------------------------------------------------------------

/// A marker segment: `marker` is the byte after 0xFF; `start..end` spans the
/// whole segment including marker and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    marker: u8,
    start: usize,
    end: usize,
}

impl Segment {
    fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start + 4..self.end]
    }
}

/// Walk the header segments of a JPEG, stopping at SOS.
///
/// Returns the segments and the offset where the remaining bytes (SOS and
/// entropy-coded data) begin.
fn jpeg_header_segments(data: &[u8]) -> Option<(Vec<Segment>, usize)> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes between markers
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            return Some((segments, pos));
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > data.len() {
            return None;
        }
        segments.push(Segment {
            marker,
            start: pos,
            end,
        });
        pos = end;
    }
    Some((segments, pos.min(data.len())))
}

fn extract_from_jpeg(data: &[u8]) -> MetadataBlocks {
    let Some((segments, _)) = jpeg_header_segments(data) else {
        return MetadataBlocks::default();
    };
    let mut blocks = MetadataBlocks::default();
    for seg in &segments {
        let payload = seg.payload(data);
        match seg.marker {
            0xE0 if payload.starts_with(JFIF_HEADER) && blocks.jfif.is_none() => {
                blocks.jfif = Some(payload.to_vec());
            }
            0xE1 if payload.starts_with(EXIF_HEADER) && blocks.exif.is_none() => {
                blocks.exif = Some(payload.to_vec());
            }
            0xED if payload.starts_with(PHOTOSHOP_HEADER) && blocks.iptc.is_none() => {
                blocks.iptc = Some(payload.to_vec());
            }
            _ => {}
        }
    }
    blocks
}

// ---------------------------------------------------------------------------
// PNG: eXIf chunk
// ---------------------------------------------------------------------------

/// Lift the `eXIf` chunk (raw TIFF) from a PNG and wrap it as an APP1 payload.
fn extract_from_png(data: &[u8]) -> MetadataBlocks {
    let mut blocks = MetadataBlocks::default();
    if !data.starts_with(PNG_SIGNATURE) {
        return blocks;
    }
    let mut pos = PNG_SIGNATURE.len();
    // Each chunk: length (4) + type (4) + data + CRC (4)
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let Some(body_end) = body_start.checked_add(len).filter(|&e| e + 4 <= data.len()) else {
            break;
        };
        if kind == b"eXIf" {
            let mut payload = EXIF_HEADER.to_vec();
            payload.extend_from_slice(&data[body_start..body_end]);
            blocks.exif = Some(payload);
            break;
        }
        if kind == b"IDAT" || kind == b"IEND" {
            break;
        }
        pos = body_end + 4;
    }
    blocks
}

// ---------------------------------------------------------------------------
// Orientation reset (TIFF IFD0)
// ---------------------------------------------------------------------------

/// Rewrite the orientation tag in IFD0 of an `Exif\0\0`-prefixed payload to 1.
///
/// Edits in place so every other byte (and every offset) stays valid.
/// Returns `true` if a tag was found and rewritten.
pub fn reset_orientation(exif_payload: &mut [u8]) -> bool {
    if !exif_payload.starts_with(EXIF_HEADER) {
        return false;
    }
    let tiff = &mut exif_payload[EXIF_HEADER.len()..];
    if tiff.len() < 8 {
        return false;
    }

    let big_endian = match &tiff[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return false,
    };

    let read_u16 = |buf: &[u8], offset: usize| -> u16 {
        let bytes = [buf[offset], buf[offset + 1]];
        if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    };
    let read_u32 = |buf: &[u8], offset: usize| -> u32 {
        let bytes = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    };

    if read_u16(tiff, 2) != 42 {
        return false;
    }

    let ifd0 = read_u32(tiff, 4) as usize;
    if ifd0 + 2 > tiff.len() {
        return false;
    }
    let entry_count = read_u16(tiff, ifd0) as usize;

    for i in 0..entry_count {
        let entry = ifd0 + 2 + i * 12;
        if entry + 12 > tiff.len() {
            return false;
        }
        if read_u16(tiff, entry) == TAG_ORIENTATION && read_u16(tiff, entry + 2) == TYPE_SHORT {
            // SHORT values sit left-justified in the 4-byte value field
            let upright = if big_endian {
                1u16.to_be_bytes()
            } else {
                1u16.to_le_bytes()
            };
            tiff[entry + 8..entry + 10].copy_from_slice(&upright);
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Re-insertion
// ---------------------------------------------------------------------------

/// Insert allow-listed blocks into an encoded JPEG.
///
/// Layout of the result: SOI, JFIF (the source's if present, else the
/// encoder's), EXIF, IPTC, then the encoder's remaining segments and scan
/// data. Blocks that do not fit one marker segment are dropped. Input that
/// is not a well-formed JPEG is returned unchanged.
pub fn insert_into_jpeg(encoded: &[u8], blocks: &MetadataBlocks) -> Vec<u8> {
    let Some((segments, scan_start)) = jpeg_header_segments(encoded) else {
        return encoded.to_vec();
    };

    let mut out = Vec::with_capacity(encoded.len() + 1024);
    out.extend_from_slice(&[0xFF, 0xD8]);

    let encoder_jfif = segments
        .iter()
        .find(|s| s.marker == 0xE0 && s.payload(encoded).starts_with(JFIF_HEADER));

    match (&blocks.jfif, encoder_jfif) {
        (Some(jfif), _) => push_segment(&mut out, 0xE0, jfif),
        (None, Some(seg)) => out.extend_from_slice(&encoded[seg.start..seg.end]),
        (None, None) => {}
    }
    if let Some(exif) = &blocks.exif {
        push_segment(&mut out, 0xE1, exif);
    }
    if let Some(iptc) = &blocks.iptc {
        push_segment(&mut out, 0xED, iptc);
    }

    for seg in &segments {
        let payload = seg.payload(encoded);
        let replaced = (seg.marker == 0xE0 && payload.starts_with(JFIF_HEADER))
            || (seg.marker == 0xE1 && payload.starts_with(EXIF_HEADER) && blocks.exif.is_some())
            || (seg.marker == 0xED && blocks.iptc.is_some());
        if !replaced {
            out.extend_from_slice(&encoded[seg.start..seg.end]);
        }
    }
    out.extend_from_slice(&encoded[scan_start..]);
    out
}

fn push_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        tracing::warn!(
            marker = format_args!("{marker:#04x}"),
            len = payload.len(),
            "metadata block too large for one segment, dropped"
        );
        return;
    }
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}
