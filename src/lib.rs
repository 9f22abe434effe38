//! # boxscale
//!
//! Downscale images by **box filtering**: every destination pixel is the mean
//! of a block of source pixels, which avoids the aliasing that point sampling
//! produces on fine detail. The source is first cropped to the destination
//! aspect ratio, so nothing is stretched.
//!
//! # Request Flow
//!
//! ```text
//! Source ─► SourceCache ─► calculate_crop ─► downsample ─► Produce ─► Output
//!             (decode once,    (aspect ratio)   (box filter,   (pixels, bytes,
//!              share result)                     rayon rows)    data URL)
//! ```
//!
//! A [`downscale::Downscaler`] owns one [`cache::SourceCache`] and the two
//! collaborators: [`imaging::Acquire`] (file, URL, in-memory bytes or pixels
//! → decoded RGBA) and [`imaging::Produce`] (downscaled pixels → result).
//! Both are implemented by [`imaging::RustBackend`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel buffers, crop geometry, the box filter, collaborator traits and the `image`-based backend |
//! | [`cache`] | Single-flight decoded-source cache with optional LRU bound |
//! | [`downscale`] | Request type, textual request parsing, the `Downscaler` orchestrator |
//! | [`source`] | Source kinds and their cache identities |
//! | [`config`] | `boxscale.toml` loading, validation and merging |
//! | [`error`] | Request-level error taxonomy |
//! | [`timing`] | Per-phase timing for debug requests |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Decode Once
//!
//! Decoding dominates the cost of a request. Requests for the same source that
//! overlap in time share a single acquisition: the first one reserves the
//! cache entry, later ones subscribe to it and are woken in arrival order when
//! the pixels are ready. A failed acquisition is reported to every waiter and
//! leaves no entry behind, so the next request tries again.
//!
//! ## Context Object, Not a Global
//!
//! The cache lives inside a `Downscaler` value. Tests build one per case with
//! mock collaborators, and independent downscalers never see each other's
//! entries.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding go through the `image` crate, URL fetches through
//! `reqwest` with rustls. No system libraries are needed.

pub mod cache;
pub mod config;
pub mod downscale;
pub mod error;
pub mod imaging;
pub mod output;
pub mod source;
pub mod timing;

#[cfg(test)]
pub(crate) mod test_helpers;
