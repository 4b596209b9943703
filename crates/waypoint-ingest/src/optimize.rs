// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decode, cap width and re-encode to JPEG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use waypoint_core::WaypointError;

const SERVICE: &str = "image";

/// Content type of every optimised image.
pub const JPEG_MIME: &str = "image/jpeg";

/// A re-encoded image and its final geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OptimizedImage {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Target size for an image no wider than `max_width`, aspect preserved.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
    (max_width, scaled as u32)
}

/// CPU-bound; call through [`optimize_blocking`] from async code.
pub fn optimize(bytes: &[u8], max_width: u32, quality: u8) -> Result<OptimizedImage, WaypointError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| WaypointError::bad_request(SERVICE, format!("cannot decode image: {e}")))?;
    let (width, height) = decoded.dimensions();
    let (target_w, target_h) = fit_width(width, height, max_width);
    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_w, target_h, FilterType::Lanczos3)
    };
    let rgb = match resized {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    };

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| WaypointError::Internal(format!("jpeg encode failed: {e}")))?;

    Ok(OptimizedImage {
        bytes: out.into_inner(),
        width: target_w,
        height: target_h,
    })
}

/// [`optimize`] on the blocking pool.
pub async fn optimize_blocking(
    bytes: Vec<u8>,
    max_width: u32,
    quality: u8,
) -> Result<OptimizedImage, WaypointError> {
    tokio::task::spawn_blocking(move || optimize(&bytes, max_width, quality))
        .await
        .map_err(|e| WaypointError::Internal(format!("image task failed: {e}")))?
}
