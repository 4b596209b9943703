// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end orchestrator testing.
//!
//! `TestHarness` assembles an [`Orchestrator`] over a [`ScriptedLlm`] and
//! in-memory stores. Posts and media are seeded with bag-of-words
//! embeddings, so a query that shares words with a seeded item retrieves it.

use std::sync::Arc;
use std::time::Duration;

use waypoint_agent::orchestrator::{
    Orchestrator, OrchestratorSettings, RecommendRequest, RecommendationOutcome,
};
use waypoint_core::traits::{SignalStore, VectorIndex};
use waypoint_core::types::{EventType, MediaAsset, Post, PostStatus, Signal};
use waypoint_core::WaypointError;

use crate::scripted_llm::{ScriptedLlm, bag_of_words};
use crate::stores::{InMemoryIndex, InMemorySignalStore, RecordingUsageSink};

/// Similarity floor used by the harness. Bag-of-words vectors score lower
/// than real embeddings.
pub const HARNESS_THRESHOLD: f32 = 0.05;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    settings: OrchestratorSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            settings: OrchestratorSettings {
                post_threshold: HARNESS_THRESHOLD,
                media_threshold: HARNESS_THRESHOLD,
                ..OrchestratorSettings::default()
            },
        }
    }

    /// Override the overall request deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.settings.deadline = deadline;
        self
    }

    /// Override the per-retrieval candidate cap.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.settings.top_k = k;
        self
    }

    pub fn with_thresholds(mut self, post: f32, media: f32) -> Self {
        self.settings.post_threshold = post;
        self.settings.media_threshold = media;
        self
    }

    pub fn build(self) -> TestHarness {
        let usage = Arc::new(RecordingUsageSink::new());
        let llm = Arc::new(ScriptedLlm::new().with_usage_sink(usage.clone()));
        TestHarness {
            llm,
            signals: Arc::new(InMemorySignalStore::new()),
            index: Arc::new(InMemoryIndex::new()),
            usage,
            settings: self.settings,
        }
    }
}

/// A complete orchestrator environment with scripted adapters.
pub struct TestHarness {
    /// The scripted LLM; queue replies per agent before calling `recommend`.
    pub llm: Arc<ScriptedLlm>,
    pub signals: Arc<InMemorySignalStore>,
    pub index: Arc<InMemoryIndex>,
    /// Usage rows written by the scripted LLM.
    pub usage: Arc<RecordingUsageSink>,
    pub settings: OrchestratorSettings,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings and low similarity thresholds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A fresh orchestrator over the harness adapters.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.llm.clone(),
            self.signals.clone(),
            self.index.clone(),
            self.settings.clone(),
        )
    }

    /// Drive one recommendation through the full pipeline.
    pub async fn recommend(&self, session_id: &str, query: &str) -> RecommendationOutcome {
        self.orchestrator()
            .recommend(RecommendRequest::new(session_id, query))
            .await
    }

    /// Append `count` signals of one type against one target.
    pub async fn seed_signals(
        &self,
        session_id: &str,
        event_type: EventType,
        target_type: &str,
        count: usize,
    ) -> Result<(), WaypointError> {
        for n in 0..count {
            let signal = Signal::new(session_id, event_type)
                .with_target(target_type, Some(format!("{target_type}-{n}")));
            self.signals.append_signal(&signal).await?;
        }
        Ok(())
    }

    /// Store a published post embedded from its title and tags.
    pub async fn seed_post(
        &self,
        slug: &str,
        title: &str,
        tags: &[&str],
    ) -> Result<Post, WaypointError> {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let post = Post {
            id: None,
            slug: slug.to_string(),
            title: title.to_string(),
            content: String::new(),
            language: "en".to_string(),
            category: Some("travel".to_string()),
            embedding: Some(bag_of_words(&format!("{title} {}", tags.join(" ")))),
            tags,
            location: None,
            status: PostStatus::Published,
            created_at: None,
            updated_at: None,
            metadata: serde_json::Value::Null,
        };
        self.index.upsert_post(&post).await
    }

    /// Store a media asset embedded from its alt text.
    pub async fn seed_media(&self, name: &str, alt_text: &str) -> Result<MediaAsset, WaypointError> {
        let asset = MediaAsset {
            id: None,
            public_url: format!("https://storage.test/public/seed/{name}.jpg"),
            storage_path: format!("seed/{name}.jpg"),
            title: name.to_string(),
            alt_text: alt_text.to_string(),
            embedding: bag_of_words(alt_text),
            ai_description: alt_text.to_string(),
            semantic_tags: Vec::new(),
            width: 1600,
            height: 1067,
            size_bytes: 1024,
            source_url: format!("https://images.test/{name}"),
            provider: "seed".to_string(),
        };
        self.index.insert_media(&asset).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
