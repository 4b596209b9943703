// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding index trait for posts and media.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Candidate, MediaAsset, Post};

/// Vector search and writes over the post and media indexes.
///
/// Searches run server side; results come back ordered by descending
/// similarity and bounded by `k`.
#[async_trait]
pub trait VectorIndex: PluginAdapter {
    /// Nearest posts with similarity at or above `threshold`.
    async fn fetch_posts_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError>;

    /// Nearest media assets with similarity at or above `threshold`.
    async fn fetch_media_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError>;

    /// Inserts or updates a post keyed by slug.
    async fn upsert_post(&self, post: &Post) -> Result<Post, WaypointError>;

    /// Inserts one media index row.
    async fn insert_media(&self, asset: &MediaAsset) -> Result<MediaAsset, WaypointError>;

    /// Writes the lightweight row the public site reads.
    async fn insert_site_media(&self, asset: &MediaAsset) -> Result<(), WaypointError>;
}
