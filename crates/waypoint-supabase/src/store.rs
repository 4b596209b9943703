// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`SupabaseStore`]: every database-backed trait on one gated, retried client.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, info, trace};
use waypoint_config::model::SupabaseConfig;
use waypoint_config::secrets::ResolvedSecrets;
use waypoint_core::WaypointError;
use waypoint_core::traits::{
    KnowledgeStore, ObjectStorage, PluginAdapter, SignalStore, UsageSink, VectorIndex,
};
use waypoint_core::types::{
    AdapterType, Candidate, HealthStatus, KnowledgeEntry, MediaAsset, Namespace, Post, Signal,
    UsageRecord, check_dimension,
};
use waypoint_resilience::{ConcurrencyGate, Deadline, RetryPolicy, bounded};

use crate::client::{MERGE_DUPLICATES, RETURN_REPRESENTATION, SERVICE, SupabaseClient};
use crate::rows::{IdRow, KnowledgeRow, MatchParams, MediaMatchRow, PostMatchRow, SignalRow, SiteMediaRow};

/// Upper bound on signals read for one session.
pub const MAX_SIGNAL_LIMIT: usize = 100;

/// Upper bound on rows requested from a nearest-neighbour procedure.
pub const MAX_MATCH_COUNT: usize = 50;

pub const SIGNALS_TABLE: &str = "user_signals";
pub const POSTS_TABLE: &str = "posts";
pub const MEDIA_LIBRARY_TABLE: &str = "media_library";
pub const SITE_MEDIA_TABLE: &str = "media";
pub const KNOWLEDGE_TABLE: &str = "developer_knowledge";
pub const USAGE_TABLE: &str = "usage_logs";

/// Database, vector search, and storage access behind the `db` gate.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
    retry: RetryPolicy,
    gate: ConcurrencyGate,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(
        client: SupabaseClient,
        retry: RetryPolicy,
        gate: ConcurrencyGate,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            client,
            retry,
            gate,
            bucket: bucket.into(),
        }
    }

    /// Builds the store from configuration and resolved secrets.
    pub fn from_config(
        config: &SupabaseConfig,
        secrets: &ResolvedSecrets,
        retry: RetryPolicy,
        gate: ConcurrencyGate,
    ) -> Result<Self, WaypointError> {
        let client = SupabaseClient::new(
            &secrets.supabase_url,
            SecretString::from(secrets.supabase_key.clone()),
            Namespace::new(config.schema.clone()),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.read_timeout_secs),
        )?;
        info!(
            namespace = %config.schema,
            key_kind = ?secrets.supabase_key_kind,
            db_permits = gate.permits(),
            "supabase store initialized"
        );
        Ok(Self::new(client, retry, gate, config.storage_bucket.clone()))
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    /// Runs `op` under the `db` gate with the retry policy. The permit is
    /// held per attempt, never across a backoff sleep. Inside a request
    /// [`Deadline::scope`] neither attempts nor backoff run past the deadline.
    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, WaypointError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, WaypointError>>,
    {
        let gate = &self.gate;
        let f = &f;
        let deadline = Deadline::current();
        let deadline = deadline.as_ref();
        let started = Instant::now();
        let result = self
            .retry
            .run(SERVICE, deadline, |attempt| async move {
                bounded(SERVICE, deadline, async {
                    let _permit = gate.acquire().await?;
                    trace!(op, attempt, "database call");
                    f().await
                })
                .await
            })
            .await;
        let outcome = match &result {
            Ok(_) => "ok".to_string(),
            Err(e) => e.kind().to_string(),
        };
        metrics::counter!("waypoint_db_calls_total", "op" => op, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("waypoint_db_latency_seconds", "op" => op)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn match_candidates<R>(
        &self,
        op: &'static str,
        function: &'static str,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError>
    where
        R: serde::de::DeserializeOwned + Into<Candidate> + Send,
    {
        check_dimension(function, query_vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let params = MatchParams {
            query_embedding: query_vector,
            match_threshold: threshold,
            match_count: k.min(MAX_MATCH_COUNT),
        };
        let params = &params;
        let client = &self.client;
        let rows: Vec<R> = self
            .call(op, move || client.rpc(function, params))
            .await?;
        let candidates = bound_candidates(rows.into_iter().map(Into::into), threshold, k);
        debug!(function, returned = candidates.len(), threshold, k, "vector search complete");
        Ok(candidates)
    }
}

/// Drops rows under `threshold`, orders by descending similarity, caps at `k`.
pub fn bound_candidates(
    rows: impl IntoIterator<Item = Candidate>,
    threshold: f32,
    k: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = rows
        .into_iter()
        .filter(|c| c.similarity >= threshold)
        .collect();
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    candidates.truncate(k);
    candidates
}

#[async_trait]
impl PluginAdapter for SupabaseStore {
    fn name(&self) -> &str {
        SERVICE
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SignalStore
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        match self.client.ping(SIGNALS_TABLE, Duration::from_secs(5)).await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) if e.is_fatal() => Ok(HealthStatus::Unhealthy(e.to_string())),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }
}

#[async_trait]
impl SignalStore for SupabaseStore {
    async fn recent_signals(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Signal>, WaypointError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(MAX_SIGNAL_LIMIT);
        let params = [
            ("select", "*".to_string()),
            ("session_id", format!("eq.{session_id}")),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        let params = &params[..];
        let client = &self.client;
        let rows: Vec<SignalRow> = self
            .call("recent_signals", move || client.select(SIGNALS_TABLE, params))
            .await?;
        let signals: Vec<Signal> = rows
            .into_iter()
            .filter_map(SignalRow::into_signal)
            .take(limit)
            .collect();
        debug!(session_id, count = signals.len(), "fetched recent signals");
        Ok(signals)
    }

    async fn append_signal(&self, signal: &Signal) -> Result<(), WaypointError> {
        if signal.session_id.trim().is_empty() {
            return Err(WaypointError::bad_request(SERVICE, "signal without a session id"));
        }
        let rows = std::slice::from_ref(signal);
        let client = &self.client;
        self.call("append_signal", move || client.insert_minimal(SIGNALS_TABLE, rows))
            .await
    }
}

#[async_trait]
impl VectorIndex for SupabaseStore {
    async fn fetch_posts_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError> {
        self.match_candidates::<PostMatchRow>("match_posts", "match_posts", query_vector, threshold, k)
            .await
    }

    async fn fetch_media_by_vector(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError> {
        self.match_candidates::<MediaMatchRow>("match_media", "match_media", query_vector, threshold, k)
            .await
    }

    async fn upsert_post(&self, post: &Post) -> Result<Post, WaypointError> {
        post.validate()?;
        let rows = std::slice::from_ref(post);
        let params = [
            ("on_conflict", "slug".to_string()),
            ("select", "id".to_string()),
        ];
        let params = &params[..];
        let client = &self.client;
        let written: Vec<IdRow> = self
            .call("upsert_post", move || {
                client.insert(POSTS_TABLE, rows, MERGE_DUPLICATES, params)
            })
            .await?;
        let id = written
            .into_iter()
            .next()
            .ok_or_else(|| WaypointError::upstream(SERVICE, "upsert returned no rows"))?
            .id;
        debug!(id = %id, slug = %post.slug, "post upserted");
        Ok(Post {
            id: Some(id),
            ..post.clone()
        })
    }

    async fn insert_media(&self, asset: &MediaAsset) -> Result<MediaAsset, WaypointError> {
        check_dimension(MEDIA_LIBRARY_TABLE, &asset.embedding)?;
        let rows = std::slice::from_ref(asset);
        let params = [("select", "id".to_string())];
        let params = &params[..];
        let client = &self.client;
        let written: Vec<IdRow> = self
            .call("insert_media", move || {
                client.insert(MEDIA_LIBRARY_TABLE, rows, RETURN_REPRESENTATION, params)
            })
            .await?;
        let id = written
            .into_iter()
            .next()
            .ok_or_else(|| WaypointError::upstream(SERVICE, "insert returned no rows"))?
            .id;
        debug!(id = %id, storage_path = %asset.storage_path, "media row inserted");
        Ok(MediaAsset {
            id: Some(id),
            ..asset.clone()
        })
    }

    async fn insert_site_media(&self, asset: &MediaAsset) -> Result<(), WaypointError> {
        let rows = [SiteMediaRow::from(asset)];
        let rows = &rows[..];
        let client = &self.client;
        self.call("insert_site_media", move || {
            client.insert_minimal(SITE_MEDIA_TABLE, rows)
        })
        .await
    }
}

#[async_trait]
impl KnowledgeStore for SupabaseStore {
    async fn insert_entry(&self, entry: &KnowledgeEntry) -> Result<String, WaypointError> {
        match &entry.embedding {
            Some(embedding) => check_dimension(KNOWLEDGE_TABLE, embedding)?,
            None => {
                return Err(WaypointError::bad_request(
                    KNOWLEDGE_TABLE,
                    "knowledge entries are written with an embedding",
                ));
            }
        }
        let rows = std::slice::from_ref(entry);
        let params = [("select", "id".to_string())];
        let params = &params[..];
        let client = &self.client;
        let written: Vec<IdRow> = self
            .call("insert_entry", move || {
                client.insert(KNOWLEDGE_TABLE, rows, RETURN_REPRESENTATION, params)
            })
            .await?;
        written
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| WaypointError::upstream(SERVICE, "insert returned no rows"))
    }

    async fn match_entries(
        &self,
        query_vector: &[f32],
        threshold: f32,
        k: usize,
    ) -> Result<Vec<KnowledgeEntry>, WaypointError> {
        check_dimension(KNOWLEDGE_TABLE, query_vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let params = MatchParams {
            query_embedding: query_vector,
            match_threshold: threshold,
            match_count: k.min(MAX_MATCH_COUNT),
        };
        let params = &params;
        let client = &self.client;
        let rows: Vec<KnowledgeRow> = self
            .call("match_developer_knowledge", move || {
                client.rpc("match_developer_knowledge", params)
            })
            .await?;
        Ok(rows.into_iter().map(KnowledgeEntry::from).collect())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStore {
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, WaypointError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(WaypointError::bad_request(SERVICE, "empty storage path"));
        }
        let size = bytes.len();
        let bytes = &bytes;
        let bucket = self.bucket.as_str();
        let client = &self.client;
        self.call("upload_object", move || {
            client.upload(bucket, path, bytes.clone(), content_type)
        })
        .await?;
        debug!(bucket, path, size, "object uploaded");
        Ok(self.client.public_url(&self.bucket, path))
    }
}

#[async_trait]
impl UsageSink for SupabaseStore {
    async fn record(&self, record: UsageRecord) -> Result<(), WaypointError> {
        let rows = [record];
        let rows = &rows[..];
        let client = &self.client;
        self.call("record_usage", move || client.insert_minimal(USAGE_TABLE, rows))
            .await
    }
}

#[cfg(test)]
mod tests {
    use waypoint_core::types::CandidateKind;

    use super::*;

    fn candidate(id: &str, similarity: f32) -> Candidate {
        Candidate::new(id, CandidateKind::Post, similarity)
    }

    #[test]
    fn bound_candidates_filters_sorts_and_caps() {
        let rows = vec![
            candidate("a", 0.45),
            candidate("b", 0.91),
            candidate("c", 0.55),
            candidate("d", 0.72),
            candidate("e", 0.50),
        ];
        let out = bound_candidates(rows, 0.5, 3);
        let ids: Vec<_> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }

    #[test]
    fn bound_candidates_keeps_threshold_inclusive() {
        let out = bound_candidates(vec![candidate("x", 0.4)], 0.4, 5);
        assert_eq!(out.len(), 1);
    }
}
