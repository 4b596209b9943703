// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entities shared across the Waypoint workspace.
//!
//! Field names follow the column names of the hosted Postgres tables so rows
//! can be sent and received without an intermediate mapping layer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::WaypointError;

/// Dimension of every dense vector written to or read from the indexes.
///
/// Matches the output of `text-embedding-004`; the gateway requests this
/// dimension explicitly and writers verify it before sending.
pub const EMBEDDING_DIM: usize = 768;

/// Verify a vector has exactly [`EMBEDDING_DIM`] components.
pub fn check_dimension(service: &str, vector: &[f32]) -> Result<(), WaypointError> {
    if vector.len() != EMBEDDING_DIM {
        return Err(WaypointError::bad_request(
            service,
            format!(
                "embedding has dimension {}, expected {EMBEDDING_DIM}",
                vector.len()
            ),
        ));
    }
    Ok(())
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external seam an adapter sits on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Llm,
    SignalStore,
    VectorIndex,
    KnowledgeStore,
    ObjectStorage,
    UsageSink,
}

/// Database namespace selected on every request.
///
/// The Supabase client turns this into profile headers; nothing above the
/// client sees the header names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(pub String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self("public".into())
    }
}

/// Lifecycle status of a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

/// Optional place a post is about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// A blog post row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Post {
    /// Check the row invariants before it is written.
    pub fn validate(&self) -> Result<(), WaypointError> {
        if self.status == PostStatus::Published
            && (self.slug.trim().is_empty() || self.language.trim().is_empty())
        {
            return Err(WaypointError::bad_request(
                "posts",
                "published posts need a slug and a language tag",
            ));
        }
        if let Some(embedding) = &self.embedding {
            check_dimension("posts", embedding)?;
        }
        Ok(())
    }
}

/// A media library row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub public_url: String,
    pub storage_path: String,
    pub title: String,
    pub alt_text: String,
    pub embedding: Vec<f32>,
    pub ai_description: String,
    #[serde(default)]
    pub semantic_tags: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub source_url: String,
    pub provider: String,
}

/// The closed set of behavioural event types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    View,
    Click,
    Search,
    Dwell,
    RageClick,
    Scroll,
    Share,
    Save,
}

/// One behavioural event recorded for a session. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub event_type: EventType,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Signal {
    /// A signal stamped with the current time.
    pub fn new(session_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            user_id: None,
            event_type,
            target_type: None,
            target_id: None,
            metadata: serde_json::Value::Null,
            created_at: Some(now_timestamp()),
        }
    }

    pub fn with_target(mut self, target_type: impl Into<String>, target_id: Option<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = target_id;
        self
    }
}

/// A problem/solution pair in the developer knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Set only on rows returned from a similarity search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Token counts reported by the model provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One usage accounting row. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub agent_name: String,
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: String,
}

impl UsageRecord {
    pub fn new(
        agent_name: impl Into<String>,
        model_id: impl Into<String>,
        usage: TokenUsage,
        session_id: Option<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            model_id: model_id.into(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            session_id,
            created_at: now_timestamp(),
        }
    }
}

/// Which index a candidate came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Post,
    Media,
}

/// A retrieval result: identity, similarity, and a small display projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub kind: CandidateKind,
    pub similarity: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, kind: CandidateKind, similarity: f32) -> Self {
        Self {
            id: id.into(),
            kind,
            similarity,
            title: None,
            slug: None,
            category: None,
            tags: Vec::new(),
            alt_text: None,
            url: None,
        }
    }
}

/// Current UTC time in the timestamp format written to every table.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
