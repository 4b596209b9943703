// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media ingestion for Waypoint.
//!
//! Reads a manifest of remote images and imports each one into object
//! storage and the media vector index, described and embedded on the way.

pub mod download;
pub mod manifest;
pub mod optimize;
pub mod pipeline;

pub use download::Downloader;
pub use manifest::{ManifestItem, load_manifest, parse_manifest};
pub use optimize::{JPEG_MIME, OptimizedImage, fit_width, optimize, optimize_blocking};
pub use pipeline::{
    FailedItem, ImageDescription, IngestPipeline, IngestReport, IngestSettings, parse_description,
    storage_path,
};
