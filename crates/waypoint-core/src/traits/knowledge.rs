// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Developer knowledge store trait.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::traits::adapter::PluginAdapter;
use crate::types::KnowledgeEntry;

#[async_trait]
pub trait KnowledgeStore: PluginAdapter {
    /// Inserts an entry and returns its id.
    async fn insert_entry(&self, entry: &KnowledgeEntry) -> Result<String, WaypointError>;

    /// Nearest entries with similarity at or above `threshold`.
    async fn match_entries(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<KnowledgeEntry>, WaypointError>;
}
