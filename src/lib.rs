//! # pixpress
//!
//! Proportional-fit image compression. Given a source image and a minimum
//! bounding box, pixpress decides how far to scale, how to rotate, and whether
//! the work can be skipped entirely, then carries the decision out with a
//! pure Rust codec stack.
//!
//! # Architecture: Plan, Then Execute
//!
//! ```text
//! 1. Probe     bytes          →  SourceImageInfo   (header only, no pixel decode)
//! 2. Plan      info + request →  CompressPlan      (pure arithmetic)
//! 3. Execute   plan           →  encoded bytes     (fast copy or full render)
//! ```
//!
//! The planner is the one piece every platform must agree on, so it has no
//! I/O and no codec dependency. Hosts with their own codecs call it through
//! [`ffi`]; this crate's own backend executes plans with the `image` crate.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Planner, metadata allow-list, backend trait + pure Rust backend, compress operations |
//! | [`process`] | Batch compression of a directory tree on a bounded worker pool |
//! | [`config`] | `pixpress.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting: pure `format_*` functions plus `print_*` wrappers |
//! | [`ffi`] | C ABI entry point for the planner |
//!
//! # Design Decisions
//!
//! ## Never Upscale
//!
//! The bounding box is a *minimum*: the image is scaled so that its limiting
//! axis just reaches the box, and sources already inside the box keep their
//! size. The scale ratio is therefore always in `(0, 1]`.
//!
//! ## Fast Path
//!
//! JPEG output with no rotation, no sampling and a ratio of effectively 1
//! needs no pixel work. A JPEG source is copied byte-for-byte, so nothing is
//! lost to a decode/encode generation.
//!
//! ## Logging
//!
//! The library emits `tracing` events and never decides whether they are
//! shown. The CLI installs a `tracing-subscriber` filter driven by `-v` and
//! `RUST_LOG`.

pub mod config;
pub mod ffi;
pub mod imaging;
pub mod output;
pub mod process;
