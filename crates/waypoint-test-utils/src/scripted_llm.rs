// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM provider for deterministic testing.
//!
//! `ScriptedLlm` answers `generate` from per-agent FIFO queues and `embed`
//! with a hashed bag-of-words vector, so texts sharing words land close
//! together without any network access.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use waypoint_core::traits::{
    EmbedRequest, GenerateRequest, Generation, LlmProvider, PluginAdapter, UsageSink,
};
use waypoint_core::types::{AdapterType, HealthStatus, TokenUsage, UsageRecord};
use waypoint_core::{EMBEDDING_DIM, WaypointError};

/// Builds a fresh error for every call that should fail.
pub type ErrorFactory = Arc<dyn Fn() -> WaypointError + Send + Sync>;

/// One scripted reply.
#[derive(Clone)]
pub enum Script {
    Text(String),
    Fail(ErrorFactory),
    /// Never resolves; used to exercise deadlines.
    Hang,
}

/// Model id reported by every scripted generation.
pub const SCRIPTED_MODEL: &str = "scripted-model";

/// A scripted LLM provider.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    embeds: Mutex<Vec<EmbedRequest>>,
    fail_all: Mutex<Option<ErrorFactory>>,
    fail_embeddings: Mutex<Option<ErrorFactory>>,
    usage: Option<Arc<dyn UsageSink>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report usage for every successful generation, like the real gateway.
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }

    pub async fn push(&self, agent: &str, script: Script) {
        self.scripts
            .lock()
            .await
            .entry(agent.to_string())
            .or_default()
            .push_back(script);
    }

    pub async fn push_text(&self, agent: &str, text: impl Into<String>) {
        self.push(agent, Script::Text(text.into())).await;
    }

    pub async fn push_json(&self, agent: &str, value: &Value) {
        self.push(agent, Script::Text(value.to_string())).await;
    }

    pub async fn push_error<F>(&self, agent: &str, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        self.push(agent, Script::Fail(Arc::new(make))).await;
    }

    pub async fn push_hang(&self, agent: &str) {
        self.push(agent, Script::Hang).await;
    }

    /// Every generation fails with `make()` until cleared.
    pub async fn fail_all_with<F>(&self, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        *self.fail_all.lock().await = Some(Arc::new(make));
    }

    /// Every embedding fails with `make()` until cleared.
    pub async fn fail_embeddings_with<F>(&self, make: F)
    where
        F: Fn() -> WaypointError + Send + Sync + 'static,
    {
        *self.fail_embeddings.lock().await = Some(Arc::new(make));
    }

    /// Generation requests seen so far, in call order.
    pub async fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of generation calls made by `agent`.
    pub async fn calls(&self, agent: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.agent == agent)
            .count()
    }

    /// Embedding requests seen so far, in call order.
    pub async fn embed_requests(&self) -> Vec<EmbedRequest> {
        self.embeds.lock().await.clone()
    }

    async fn next_script(&self, agent: &str) -> Option<Script> {
        if let Some(make) = self.fail_all.lock().await.clone() {
            return Some(Script::Fail(make));
        }
        self.scripts
            .lock()
            .await
            .get_mut(agent)
            .and_then(VecDeque::pop_front)
    }
}

/// Deterministic bag-of-words embedding of dimension [`EMBEDDING_DIM`].
///
/// Lowercased alphanumeric tokens are hashed into buckets and the result is
/// L2-normalised, so cosine similarity tracks word overlap.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
    {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() % EMBEDDING_DIM as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity of two vectors of equal length.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl PluginAdapter for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, WaypointError> {
        self.requests.lock().await.push(request.clone());
        let script = self.next_script(&request.agent).await;
        let text = match script {
            Some(Script::Text(text)) => text,
            Some(Script::Fail(make)) => return Err(make()),
            Some(Script::Hang) => std::future::pending().await,
            None => {
                return Err(WaypointError::parse(format!(
                    "no scripted response for agent `{}`",
                    request.agent
                )));
            }
        };

        let usage = TokenUsage {
            prompt_tokens: request.prompt.split_whitespace().count() as u32,
            completion_tokens: text.split_whitespace().count() as u32,
            total_tokens: (request.prompt.split_whitespace().count()
                + text.split_whitespace().count()) as u32,
        };
        if let Some(sink) = self.usage.clone() {
            let record = UsageRecord::new(
                &request.agent,
                SCRIPTED_MODEL,
                usage,
                request.session_id.clone(),
            );
            tokio::spawn(async move {
                let _ = sink.record(record).await;
            });
        }
        Ok(Generation {
            text,
            usage,
            model: SCRIPTED_MODEL.to_string(),
        })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Vec<f32>, WaypointError> {
        self.embeds.lock().await.push(request.clone());
        if let Some(make) = self.fail_embeddings.lock().await.clone() {
            return Err(make());
        }
        if request.text.trim().is_empty() {
            return Err(WaypointError::bad_request("scripted-llm", "cannot embed empty text"));
        }
        Ok(bag_of_words(&request.text))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn queues_are_per_agent_and_fifo() {
        let llm = ScriptedLlm::new();
        llm.push_text("persona", "first").await;
        llm.push_text("persona", "second").await;
        llm.push_json("judge", &json!({"ok": true})).await;

        let a = llm.generate(GenerateRequest::new("persona", "p")).await.unwrap();
        let b = llm.generate(GenerateRequest::new("judge", "p")).await.unwrap();
        let c = llm.generate(GenerateRequest::new("persona", "p")).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "{\"ok\":true}");
        assert_eq!(c.text, "second");
        assert_eq!(llm.calls("persona").await, 2);

        let err = llm.generate(GenerateRequest::new("persona", "p")).await.unwrap_err();
        assert_eq!(err.kind(), waypoint_core::ErrorKind::ParseError);
    }

    #[tokio::test]
    async fn injected_failures_override_queues() {
        let llm = ScriptedLlm::new();
        llm.push_text("persona", "never seen").await;
        llm.fail_all_with(|| WaypointError::Auth {
            service: "gemini".into(),
            message: "revoked".into(),
        })
        .await;
        let err = llm.generate(GenerateRequest::new("persona", "p")).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_resolves() {
        let llm = ScriptedLlm::new();
        llm.push_hang("synthesis").await;
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            llm.generate(GenerateRequest::new("synthesis", "p")),
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn bag_of_words_tracks_overlap() {
        let a = bag_of_words("quiet mountain village for slow living");
        let b = bag_of_words("slow living in a quiet mountain village");
        let c = bag_of_words("neon nightlife rooftop bars");
        assert_eq!(a.len(), EMBEDDING_DIM);
        assert!(cosine(&a, &b) > 0.8);
        assert!(cosine(&a, &c) < cosine(&a, &b));
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }
}
