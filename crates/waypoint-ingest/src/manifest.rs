// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion manifests: a JSON array of remote images to import.

use std::path::Path;

use serde::{Deserialize, Serialize};
use waypoint_core::WaypointError;

const SERVICE: &str = "manifest";

/// One image to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Alt text supplied by the source; the model's is used otherwise.
    #[serde(default)]
    pub alt: Option<String>,
}

fn default_provider() -> String {
    "manual".to_string()
}

/// Parse and check a manifest document.
pub fn parse_manifest(json: &str) -> Result<Vec<ManifestItem>, WaypointError> {
    let items: Vec<ManifestItem> = serde_json::from_str(json)
        .map_err(|e| WaypointError::bad_request(SERVICE, format!("invalid manifest: {e}")))?;
    for (n, item) in items.iter().enumerate() {
        if !(item.url.starts_with("http://") || item.url.starts_with("https://")) {
            return Err(WaypointError::bad_request(
                SERVICE,
                format!("item {n}: url must be http(s), got {:?}", item.url),
            ));
        }
        if item.title.trim().is_empty() {
            return Err(WaypointError::bad_request(
                SERVICE,
                format!("item {n}: title is empty"),
            ));
        }
    }
    Ok(items)
}

/// Read and parse a manifest file.
pub async fn load_manifest(path: &Path) -> Result<Vec<ManifestItem>, WaypointError> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        WaypointError::bad_request(SERVICE, format!("cannot read {}: {e}", path.display()))
    })?;
    parse_manifest(&json)
}
