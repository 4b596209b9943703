// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object storage trait.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait ObjectStorage: PluginAdapter {
    /// Uploads (or overwrites) `path` and returns its public URL.
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, WaypointError>;
}
