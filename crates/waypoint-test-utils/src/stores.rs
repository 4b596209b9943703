// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of every store trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use waypoint_core::traits::{
    KnowledgeStore, ObjectStorage, PluginAdapter, SignalStore, UsageSink, VectorIndex,
};
use waypoint_core::types::{
    AdapterType, Candidate, CandidateKind, HealthStatus, KnowledgeEntry, MediaAsset, Post,
    Signal, UsageRecord, check_dimension,
};
use waypoint_core::WaypointError;

use crate::scripted_llm::{ErrorFactory, cosine};

macro_rules! healthy_adapter {
    ($ty:ty, $name:expr, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
                Ok(HealthStatus::Healthy)
            }
        }
    };
}

fn rank(mut scored: Vec<Candidate>, threshold: f32, k: usize) -> Vec<Candidate> {
    scored.retain(|c| c.similarity >= threshold);
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(k);
    scored
}

/// Signals kept in insertion order; reads return newest first.
#[derive(Default)]
pub struct InMemorySignalStore {
    signals: Mutex<Vec<Signal>>,
    failure: Mutex<Option<ErrorFactory>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_with<F>(&self, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        *self.failure.lock().await = Some(Arc::new(make));
    }

    pub async fn len(&self) -> usize {
        self.signals.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

healthy_adapter!(InMemorySignalStore, "memory-signals", AdapterType::SignalStore);

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn recent_signals(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Signal>, WaypointError> {
        if let Some(make) = self.failure.lock().await.clone() {
            return Err(make());
        }
        Ok(self
            .signals
            .lock()
            .await
            .iter()
            .rev()
            .filter(|s| s.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_signal(&self, signal: &Signal) -> Result<(), WaypointError> {
        self.signals.lock().await.push(signal.clone());
        Ok(())
    }
}

/// Post and media rows searched by brute-force cosine similarity.
#[derive(Default)]
pub struct InMemoryIndex {
    posts: Mutex<Vec<Post>>,
    media: Mutex<Vec<MediaAsset>>,
    site_media: Mutex<Vec<MediaAsset>>,
    post_failure: Mutex<Option<ErrorFactory>>,
    media_failure: Mutex<Option<ErrorFactory>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_posts_with<F>(&self, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        *self.post_failure.lock().await = Some(Arc::new(make));
    }

    pub async fn fail_media_with<F>(&self, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        *self.media_failure.lock().await = Some(Arc::new(make));
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.posts.lock().await.clone()
    }

    pub async fn media(&self) -> Vec<MediaAsset> {
        self.media.lock().await.clone()
    }

    pub async fn site_media(&self) -> Vec<MediaAsset> {
        self.site_media.lock().await.clone()
    }
}

healthy_adapter!(InMemoryIndex, "memory-index", AdapterType::VectorIndex);

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn fetch_posts_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError> {
        if let Some(make) = self.post_failure.lock().await.clone() {
            return Err(make());
        }
        check_dimension("match_posts", query_vector)?;
        let scored = self
            .posts
            .lock()
            .await
            .iter()
            .filter_map(|post| {
                let embedding = post.embedding.as_ref()?;
                let mut c = Candidate::new(
                    post.id.clone().unwrap_or_else(|| post.slug.clone()),
                    CandidateKind::Post,
                    cosine(query_vector, embedding),
                );
                c.title = Some(post.title.clone());
                c.slug = Some(post.slug.clone());
                c.category = post.category.clone();
                c.tags = post.tags.clone();
                Some(c)
            })
            .collect();
        Ok(rank(scored, threshold, k))
    }

    async fn fetch_media_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError> {
        if let Some(make) = self.media_failure.lock().await.clone() {
            return Err(make());
        }
        check_dimension("match_media", query_vector)?;
        let scored = self
            .media
            .lock()
            .await
            .iter()
            .map(|asset| {
                let mut c = Candidate::new(
                    asset.id.clone().unwrap_or_else(|| asset.storage_path.clone()),
                    CandidateKind::Media,
                    cosine(query_vector, &asset.embedding),
                );
                c.title = Some(asset.title.clone());
                c.alt_text = Some(asset.alt_text.clone());
                c.url = Some(asset.public_url.clone());
                c.tags = asset.semantic_tags.clone();
                c
            })
            .collect();
        Ok(rank(scored, threshold, k))
    }

    async fn upsert_post(&self, post: &Post) -> Result<Post, WaypointError> {
        post.validate()?;
        let mut posts = self.posts.lock().await;
        let mut stored = post.clone();
        match posts.iter_mut().find(|p| p.slug == post.slug) {
            Some(existing) => {
                stored.id = existing.id.clone();
                *existing = stored.clone();
            }
            None => {
                stored.id = Some(format!("post-{}", posts.len() + 1));
                posts.push(stored.clone());
            }
        }
        Ok(stored)
    }

    async fn insert_media(&self, asset: &MediaAsset) -> Result<MediaAsset, WaypointError> {
        check_dimension("media_library", &asset.embedding)?;
        let mut media = self.media.lock().await;
        if media.iter().any(|m| m.storage_path == asset.storage_path) {
            return Err(WaypointError::bad_request(
                "media_library",
                format!("duplicate storage path {}", asset.storage_path),
            ));
        }
        let mut stored = asset.clone();
        stored.id = Some(format!("media-{}", media.len() + 1));
        media.push(stored.clone());
        Ok(stored)
    }

    async fn insert_site_media(&self, asset: &MediaAsset) -> Result<(), WaypointError> {
        self.site_media.lock().await.push(asset.clone());
        Ok(())
    }
}

/// Knowledge entries searched by brute-force cosine similarity.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    entries: Mutex<Vec<KnowledgeEntry>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<KnowledgeEntry> {
        self.entries.lock().await.clone()
    }
}

healthy_adapter!(InMemoryKnowledgeStore, "memory-knowledge", AdapterType::KnowledgeStore);

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn insert_entry(&self, entry: &KnowledgeEntry) -> Result<String, WaypointError> {
        let embedding = entry.embedding.as_ref().ok_or_else(|| {
            WaypointError::bad_request("developer_knowledge", "entry without an embedding")
        })?;
        check_dimension("developer_knowledge", embedding)?;
        let mut entries = self.entries.lock().await;
        let id = format!("knowledge-{}", entries.len() + 1);
        let mut stored = entry.clone();
        stored.id = Some(id.clone());
        entries.push(stored);
        Ok(id)
    }

    async fn match_entries(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<KnowledgeEntry>, WaypointError> {
        check_dimension("developer_knowledge", query_vector)?;
        let mut scored: Vec<KnowledgeEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter_map(|entry| {
                let similarity = cosine(query_vector, entry.embedding.as_ref()?);
                let mut out = entry.clone();
                out.embedding = None;
                out.similarity = Some(similarity);
                Some(out)
            })
            .filter(|e| e.similarity.unwrap_or(0.0) >= threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .unwrap_or(0.0)
                .total_cmp(&a.similarity.unwrap_or(0.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Object storage that keeps uploads in memory.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<Vec<(String, Vec<u8>, String)>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(path, bytes, content_type)` for every upload.
    pub async fn objects(&self) -> Vec<(String, Vec<u8>, String)> {
        self.objects.lock().await.clone()
    }
}

healthy_adapter!(InMemoryObjectStorage, "memory-storage", AdapterType::ObjectStorage);

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, WaypointError> {
        let mut objects = self.objects.lock().await;
        objects.retain(|(p, _, _)| p != path);
        objects.push((path.to_string(), bytes, content_type.to_string()));
        Ok(format!("https://storage.test/public/{path}"))
    }
}

/// Usage sink that records every row.
#[derive(Default)]
pub struct RecordingUsageSink {
    records: Mutex<Vec<UsageRecord>>,
}

impl RecordingUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl UsageSink for RecordingUsageSink {
    async fn record(&self, record: UsageRecord) -> Result<(), WaypointError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use waypoint_core::types::EventType;

    use super::*;
    use crate::scripted_llm::bag_of_words;

    #[tokio::test]
    async fn signals_read_newest_first_per_session() {
        let store = InMemorySignalStore::new();
        store.append_signal(&Signal::new("s1", EventType::View)).await.unwrap();
        store.append_signal(&Signal::new("s2", EventType::Click)).await.unwrap();
        store.append_signal(&Signal::new("s1", EventType::Save)).await.unwrap();

        let got = store.recent_signals("s1", 10).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].event_type, EventType::Save);
        assert_eq!(store.recent_signals("s1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn knowledge_search_filters_and_orders() {
        let store = InMemoryKnowledgeStore::new();
        for title in ["emoji crash on windows console", "postgres vacuum tuning"] {
            store
                .insert_entry(&KnowledgeEntry {
                    id: None,
                    title: title.into(),
                    description: String::new(),
                    root_cause: String::new(),
                    solution: String::new(),
                    tech_stack: vec![],
                    metadata: serde_json::Value::Null,
                    embedding: Some(bag_of_words(title)),
                    similarity: None,
                })
                .await
                .unwrap();
        }
        let found = store
            .match_entries(&bag_of_words("windows console emoji crash"), 0.5, 5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "emoji crash on windows console");
    }
}
