// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingestion pipeline.
//!
//! Per item: download, optimise, describe with the vision model, embed as a
//! retrieval document, upload, insert into the media index, and optionally
//! dual-write the public site row. Items run in fixed-size batches with a
//! cooldown between batches and a semaphore bounding concurrency inside one.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use waypoint_config::model::IngestConfig;
use waypoint_core::traits::{
    EmbedRequest, GenerateRequest, InlineImage, LlmProvider, ObjectStorage, VectorIndex,
};
use waypoint_core::types::MediaAsset;
use waypoint_core::{ErrorKind, MAX_SLUG_LEN, WaypointError, extract_json, slugify};

use crate::download::Downloader;
use crate::manifest::ManifestItem;
use crate::optimize::{JPEG_MIME, optimize_blocking};

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "ingest";

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub cooldown: Duration,
    pub max_concurrency: usize,
    pub max_width: u32,
    pub jpeg_quality: u8,
    pub dual_write: bool,
    pub folder: String,
}

impl IngestSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
            max_concurrency: config.max_concurrency.max(1),
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
            dual_write: config.dual_write,
            folder: config.folder.clone(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// `<folder>/<slug>-<8 hex>.jpg`.
pub fn storage_path(folder: &str, title: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let folder = folder.trim_matches('/');
    let name = format!("{}-{}.jpg", slugify(title, MAX_SLUG_LEN), &id[..8]);
    if folder.is_empty() {
        name
    } else {
        format!("{folder}/{name}")
    }
}

/// What the vision model said about an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    pub description: String,
    pub alt_text: String,
    pub tags: Vec<String>,
}

/// Accepts the requested JSON or, failing that, plain prose as the description.
pub fn parse_description(text: &str) -> Result<ImageDescription, WaypointError> {
    if let Ok(Value::Object(obj)) = extract_json(text) {
        let field = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let description = field("description");
        if !description.is_empty() {
            let tags = obj
                .get("tags")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|t| t.trim().to_lowercase())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            return Ok(ImageDescription {
                alt_text: field("alt_text"),
                description,
                tags,
            });
        }
    }
    let prose = text.trim();
    if prose.is_empty() || prose.starts_with('{') {
        return Err(WaypointError::parse("vision model returned no description"));
    }
    Ok(ImageDescription {
        description: prose.to_string(),
        alt_text: String::new(),
        tags: Vec::new(),
    })
}

fn vision_prompt(item: &ManifestItem) -> String {
    format!(
        "Describe this travel photograph for a semantic image search index.\n\
         TITLE: {}\n\
         TAGS: {}\n\
         Mention setting, mood, light, colours and activities. \
         Respond with one JSON object and nothing else: \
         {{\"description\": two or three sentences, \"alt_text\": one short accessible sentence, \"tags\": up to eight lowercase tags}}",
        item.title.trim(),
        item.tags.join(", "),
    )
}

fn merge_tags(source: &[String], model: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in source.iter().chain(model) {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// One item that could not be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub succeeded: Vec<MediaAsset>,
    pub failed: Vec<FailedItem>,
    pub batches: usize,
    /// True when a fatal credential error stopped the run early.
    pub aborted: bool,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

/// Imports remote images into storage and the media index.
pub struct IngestPipeline {
    downloader: Downloader,
    llm: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
    storage: Arc<dyn ObjectStorage>,
    settings: IngestSettings,
}

impl IngestPipeline {
    pub fn new(
        downloader: Downloader,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
        storage: Arc<dyn ObjectStorage>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            downloader,
            llm,
            index,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Run every item. Per-item failures are collected, not returned.
    pub async fn run(&self, items: &[ManifestItem]) -> IngestReport {
        let semaphore = Semaphore::new(self.settings.max_concurrency.max(1));
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = items.len().div_ceil(batch_size);
        let mut report = IngestReport::default();

        info!(
            items = items.len(),
            batches = total_batches,
            concurrency = self.settings.max_concurrency,
            "ingest started"
        );

        for (n, batch) in items.chunks(batch_size).enumerate() {
            if n > 0 && !self.settings.cooldown.is_zero() {
                debug!(cooldown_ms = self.settings.cooldown.as_millis() as u64, "batch cooldown");
                tokio::time::sleep(self.settings.cooldown).await;
            }

            let results = join_all(batch.iter().map(|item| {
                let semaphore = &semaphore;
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    (item, self.ingest_one(item).await)
                }
            }))
            .await;

            for (item, result) in results {
                match result {
                    Ok(asset) => {
                        metrics::counter!("waypoint_ingest_items_total", "outcome" => "ok").increment(1);
                        report.succeeded.push(asset);
                    }
                    Err(e) => {
                        metrics::counter!("waypoint_ingest_items_total", "outcome" => "failed").increment(1);
                        warn!(url = %item.url, kind = %e.kind(), error = %e, "ingest item failed");
                        if e.kind() == ErrorKind::Auth {
                            report.aborted = true;
                        }
                        report.failed.push(FailedItem {
                            url: item.url.clone(),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
            }
            report.batches = n + 1;

            info!(
                batch = n + 1,
                batches = total_batches,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "ingest heartbeat"
            );

            if report.aborted {
                warn!(
                    remaining = items.len() - report.total(),
                    "credentials rejected, stopping ingest"
                );
                break;
            }
        }
        report
    }

    /// Ingest a single item end to end.
    pub async fn ingest_one(&self, item: &ManifestItem) -> Result<MediaAsset, WaypointError> {
        let raw = self.downloader.fetch(&item.url).await?;
        let image = optimize_blocking(raw, self.settings.max_width, self.settings.jpeg_quality).await?;
        debug!(
            url = %item.url,
            width = image.width,
            height = image.height,
            bytes = image.size_bytes(),
            "image optimised"
        );

        let request = GenerateRequest::new(AGENT, vision_prompt(item))
            .expect_json()
            .with_image(InlineImage {
                mime_type: JPEG_MIME.to_string(),
                data: image.bytes.clone(),
            });
        let generation = self.llm.generate(request).await?;
        let described = parse_description(&generation.text)?;
        let tags = merge_tags(&item.tags, &described.tags);

        let document = format!(
            "{}\n{}\n{}",
            item.title.trim(),
            described.description,
            tags.join(", ")
        );
        let embedding = self
            .llm
            .embed(EmbedRequest::document(AGENT, document).with_title(item.title.trim()))
            .await?;

        let path = storage_path(&self.settings.folder, &item.title);
        let size_bytes = image.size_bytes();
        let (width, height) = (image.width, image.height);
        let public_url = self
            .storage
            .upload_object(&path, image.bytes, JPEG_MIME)
            .await?;

        let alt_text = item
            .alt
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| Some(described.alt_text.clone()).filter(|a| !a.is_empty()))
            .unwrap_or_else(|| item.title.trim().to_string());

        let asset = MediaAsset {
            id: None,
            public_url,
            storage_path: path,
            title: item.title.trim().to_string(),
            alt_text,
            embedding,
            ai_description: described.description,
            semantic_tags: tags,
            width,
            height,
            size_bytes,
            source_url: item.url.clone(),
            provider: item.provider.clone(),
        };
        let stored = self.index.insert_media(&asset).await?;

        if self.settings.dual_write {
            if let Err(e) = self.index.insert_site_media(&stored).await {
                warn!(path = %stored.storage_path, kind = %e.kind(), error = %e, "site media dual write failed");
            }
        }

        info!(
            path = %stored.storage_path,
            width,
            height,
            bytes = size_bytes,
            "media ingested"
        );
        Ok(stored)
    }
}
