// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Problem/solution indexing into the developer knowledge store.
//!
//! `index_problem` asks the model to summarise free text into a structured
//! entry, embeds `title + description` as a retrieval document and inserts
//! one row. `find_related` embeds a query and returns the nearest entries.
//! Retries live in the gateway and the store client.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use waypoint_config::model::MemoryConfig;
use waypoint_core::traits::{EmbedRequest, GenerateRequest, KnowledgeStore, LlmProvider};
use waypoint_core::types::KnowledgeEntry;
use waypoint_core::{WaypointError, extract_json};

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "memory";

const FALLBACK_TITLE_CHARS: usize = 80;

const SUMMARY_PROMPT: &str = r#"Summarise this engineering problem for a searchable knowledge base.

Respond with one JSON object and nothing else:
{
  "title": short headline naming the symptom,
  "description": two or three sentences describing what happened,
  "root_cause": why it happened, or "" if unknown,
  "solution": what fixed it, or "" if unresolved,
  "tech_stack": list of technologies involved
}

Problem:
"#;

/// Lookup defaults.
#[derive(Debug, Clone, Copy)]
pub struct RecallSettings {
    pub threshold: f32,
    pub top_k: usize,
}

impl RecallSettings {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            threshold: config.threshold,
            top_k: config.top_k,
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Entry fields from the summariser's JSON; `title` is required.
pub fn parse_summary(value: &Value) -> Result<KnowledgeEntry, WaypointError> {
    let obj = value
        .as_object()
        .ok_or_else(|| WaypointError::parse("summary is not a JSON object"))?;
    let title = field(obj, "title");
    if title.is_empty() {
        return Err(WaypointError::parse("summary has no title"));
    }
    Ok(KnowledgeEntry {
        id: None,
        title,
        description: field(obj, "description"),
        root_cause: field(obj, "root_cause"),
        solution: field(obj, "solution"),
        tech_stack: string_list(obj.get("tech_stack")),
        metadata: Value::Null,
        embedding: None,
        similarity: None,
    })
}

/// An unsummarised entry: first line as title, full text as description.
fn raw_entry(context_text: &str) -> KnowledgeEntry {
    let first_line = context_text.lines().next().unwrap_or_default().trim();
    let title: String = first_line.chars().take(FALLBACK_TITLE_CHARS).collect();
    KnowledgeEntry {
        id: None,
        title,
        description: context_text.trim().to_string(),
        root_cause: String::new(),
        solution: String::new(),
        tech_stack: Vec::new(),
        metadata: Value::Null,
        embedding: None,
        similarity: None,
    }
}

/// Writes and searches the developer knowledge store.
pub struct KnowledgeIndexer {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeIndexer {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { llm, store }
    }

    /// Summarise, embed and insert one problem. Returns the new row id.
    ///
    /// A summary the model cannot produce is replaced by the raw text so
    /// the problem is still recorded.
    pub async fn index_problem(
        &self,
        context_text: &str,
        metadata: Option<Value>,
    ) -> Result<String, WaypointError> {
        if context_text.trim().is_empty() {
            return Err(WaypointError::bad_request(AGENT, "nothing to index"));
        }

        let request = GenerateRequest::new(AGENT, format!("{SUMMARY_PROMPT}{}", context_text.trim()))
            .expect_json();
        let summary = match self.llm.generate(request).await {
            Ok(generation) => extract_json(&generation.text).and_then(|v| parse_summary(&v)),
            Err(e) => Err(e),
        };
        let mut entry = match summary {
            Ok(entry) => entry,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "summary failed, indexing raw text");
                raw_entry(context_text)
            }
        };

        let document = format!("{}\n{}", entry.title, entry.description);
        let embedding = self
            .llm
            .embed(EmbedRequest::document(AGENT, document).with_title(entry.title.clone()))
            .await?;
        entry.embedding = Some(embedding);
        entry.metadata = metadata.unwrap_or(Value::Null);

        let id = self.store.insert_entry(&entry).await?;
        metrics::counter!("waypoint_knowledge_indexed_total").increment(1);
        info!(id = %id, title = %entry.title, "knowledge entry indexed");
        Ok(id)
    }

    /// Nearest entries to `query` with similarity at or above `threshold`,
    /// at most `k`, most similar first.
    pub async fn find_related(
        &self,
        query: &str,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<KnowledgeEntry>, WaypointError> {
        if query.trim().is_empty() {
            return Err(WaypointError::bad_request(AGENT, "empty recall query"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.llm.embed(EmbedRequest::query(AGENT, query)).await?;
        let mut entries = self.store.match_entries(&vector, threshold, k).await?;
        entries.retain(|e| e.similarity.is_some_and(|s| s >= threshold));
        entries.sort_by(|a, b| {
            b.similarity
                .unwrap_or(0.0)
                .total_cmp(&a.similarity.unwrap_or(0.0))
        });
        entries.truncate(k);
        debug!(count = entries.len(), threshold, k, "knowledge lookup complete");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use waypoint_test_utils::{InMemoryKnowledgeStore, ScriptedLlm};

    use super::*;

    #[test]
    fn summary_requires_title() {
        let e = parse_summary(&json!({
            "title": " Emoji crash ",
            "description": "d",
            "tech_stack": "python, windows"
        }))
        .unwrap();
        assert_eq!(e.title, "Emoji crash");
        assert_eq!(e.tech_stack, vec!["python", "windows"]);
        assert_eq!(e.root_cause, "");
        assert!(parse_summary(&json!({"description": "d"})).is_err());
    }

    #[tokio::test]
    async fn failed_summary_indexes_raw_text() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text(AGENT, "I could not summarise that.").await;
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let indexer = KnowledgeIndexer::new(llm, store.clone());

        let id = indexer
            .index_problem("Build fails on CI\nlinker ran out of memory", Some(json!({"repo": "site"})))
            .await
            .unwrap();
        let entries = store.entries().await;
        assert_eq!(entries[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(entries[0].title, "Build fails on CI");
        assert_eq!(entries[0].metadata, json!({"repo": "site"}));
    }

    #[tokio::test]
    async fn document_embedding_carries_title() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_json(AGENT, &json!({"title": "T", "description": "D"})).await;
        let indexer = KnowledgeIndexer::new(llm.clone(), Arc::new(InMemoryKnowledgeStore::new()));
        indexer.index_problem("text", None).await.unwrap();

        let embeds = llm.embed_requests().await;
        assert_eq!(embeds[0].text, "T\nD");
        assert_eq!(embeds[0].title.as_deref(), Some("T"));
        assert_eq!(embeds[0].task, waypoint_core::traits::EmbedTask::RetrievalDocument);
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let indexer = KnowledgeIndexer::new(
            Arc::new(ScriptedLlm::new()),
            Arc::new(InMemoryKnowledgeStore::new()),
        );
        assert!(indexer.index_problem("  ", None).await.unwrap_err().is_fatal());
        assert!(indexer.find_related("", 0.5, 5).await.unwrap_err().is_fatal());
        assert!(indexer.find_related("q", 0.5, 0).await.unwrap().is_empty());
    }
}
