// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row and RPC shapes exchanged with PostgREST.
//!
//! Rows are decoded leniently: ids may be integers or uuids, and optional
//! projection columns may be missing or null.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use waypoint_core::types::{Candidate, CandidateKind, EventType, KnowledgeEntry, MediaAsset, Signal};

/// Accepts a string or numeric id and renders it as a string.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Arguments of the `match_*` nearest-neighbour procedures.
#[derive(Debug, Clone, Serialize)]
pub struct MatchParams<'a> {
    pub query_embedding: &'a [f32],
    pub match_threshold: f32,
    pub match_count: usize,
}

/// A `user_signals` row as stored. The event type is kept as text so rows
/// written by other producers with unknown types can be skipped, not fatal.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRow {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub target_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SignalRow {
    pub fn into_signal(self) -> Option<Signal> {
        let event_type = match EventType::from_str(&self.event_type) {
            Ok(event_type) => event_type,
            Err(_) => {
                debug!(event_type = %self.event_type, "skipping signal with unknown event type");
                return None;
            }
        };
        Some(Signal {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            event_type,
            target_type: self.target_type,
            target_id: self.target_id,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

/// A row returned by `match_posts`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMatchRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub similarity: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

impl From<PostMatchRow> for Candidate {
    fn from(row: PostMatchRow) -> Self {
        let mut candidate = Candidate::new(row.id, CandidateKind::Post, row.similarity);
        candidate.title = row.title;
        candidate.slug = row.slug;
        candidate.category = row.category;
        candidate.tags = row.tags;
        candidate
    }
}

/// A row returned by `match_media`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMatchRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub similarity: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub semantic_tags: Vec<String>,
}

impl From<MediaMatchRow> for Candidate {
    fn from(row: MediaMatchRow) -> Self {
        let mut candidate = Candidate::new(row.id, CandidateKind::Media, row.similarity);
        candidate.title = row.title;
        candidate.alt_text = row.alt_text;
        candidate.url = row.public_url;
        candidate.tags = row.semantic_tags;
        candidate
    }
}

/// Row written to `media`, the table the public site reads.
#[derive(Debug, Clone, Serialize)]
pub struct SiteMediaRow<'a> {
    pub url: &'a str,
    pub alt: &'a str,
    pub title: &'a str,
    pub width: u32,
    pub height: u32,
    pub source: &'a str,
}

impl<'a> From<&'a MediaAsset> for SiteMediaRow<'a> {
    fn from(asset: &'a MediaAsset) -> Self {
        Self {
            url: &asset.public_url,
            alt: &asset.alt_text,
            title: &asset.title,
            width: asset.width,
            height: asset.height,
            source: &asset.provider,
        }
    }
}

/// A row returned by `developer_knowledge` inserts and `match_developer_knowledge`.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub similarity: Option<f32>,
}

impl From<KnowledgeRow> for KnowledgeEntry {
    fn from(row: KnowledgeRow) -> Self {
        KnowledgeEntry {
            id: Some(row.id),
            title: row.title,
            description: row.description,
            root_cause: row.root_cause.unwrap_or_default(),
            solution: row.solution.unwrap_or_default(),
            tech_stack: row.tech_stack,
            metadata: row.metadata,
            embedding: None,
            similarity: row.similarity,
        }
    }
}

/// Only the id of a freshly inserted row.
#[derive(Debug, Clone, Deserialize)]
pub struct IdRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}
