// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Final answer generation.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use waypoint_core::persona::{Persona, clamp_unit};
use waypoint_core::recommendation::ConsensusResult;
use waypoint_core::traits::{GenerateRequest, LlmProvider};
use waypoint_core::types::Candidate;
use waypoint_core::{Deadline, WaypointError, extract_json};

use crate::prompts::synthesis_prompt;

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "synthesis";

/// Confidence used when the writer omits one.
pub const DEFAULT_DRAFT_CONFIDENCE: f32 = 0.5;

/// The writer's output before the orchestrator attaches persona fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub content: String,
    pub reasoning: String,
    pub confidence: f32,
}

/// Normalise `{content, reasoning, confidence}`; `content` is required.
pub fn parse_draft(value: &Value) -> Result<Draft, WaypointError> {
    let obj = value
        .as_object()
        .ok_or_else(|| WaypointError::parse("draft is not a JSON object"))?;
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WaypointError::parse("draft has no content"))?
        .to_string();
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let confidence = obj
        .get("confidence")
        .and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .map(|c| clamp_unit(c as f32))
        .unwrap_or(DEFAULT_DRAFT_CONFIDENCE);
    Ok(Draft {
        content,
        reasoning,
        confidence,
    })
}

/// Writes the recommendation text.
pub struct SynthesisAgent {
    llm: Arc<dyn LlmProvider>,
}

impl SynthesisAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Unlike the other agents this has no local fallback: every error is
    /// returned and the orchestrator answers with its fallback payload.
    #[allow(clippy::too_many_arguments)]
    pub async fn synthesize(
        &self,
        query: &str,
        persona: &Persona,
        posts: &[Candidate],
        media: &[Candidate],
        consensus: &ConsensusResult,
        session_id: Option<&str>,
        deadline: Option<Deadline>,
    ) -> Result<Draft, WaypointError> {
        let prompt = synthesis_prompt(query, persona, posts, media, consensus);
        let mut request = GenerateRequest::new(AGENT, prompt)
            .expect_json()
            .with_session(session_id.map(str::to_string));
        if let Some(deadline) = deadline {
            request = request.with_deadline(deadline);
        }
        let generation = self.llm.generate(request).await?;
        let draft = parse_draft(&extract_json(&generation.text)?)?;
        debug!(
            chars = draft.content.len(),
            confidence = draft.confidence,
            "draft written"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use waypoint_test_utils::ScriptedLlm;

    use super::*;

    #[test]
    fn confidence_is_clamped_and_defaulted() {
        let d = parse_draft(&json!({"content": "Go to Gimmelwald.", "confidence": 3})).unwrap();
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.reasoning, "");
        let d = parse_draft(&json!({"content": "x", "confidence": "-2"})).unwrap();
        assert_eq!(d.confidence, 0.0);
        let d = parse_draft(&json!({"content": "x"})).unwrap();
        assert_eq!(d.confidence, DEFAULT_DRAFT_CONFIDENCE);
        assert!(parse_draft(&json!({"content": "  "})).is_err());
    }

    #[tokio::test]
    async fn parse_failures_are_returned() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text(AGENT, "Sure! Here is a nice trip.").await;
        let err = SynthesisAgent::new(llm)
            .synthesize(
                "q",
                &Persona::neutral(),
                &[],
                &[],
                &ConsensusResult::advisory_fallback(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), waypoint_core::ErrorKind::ParseError);
    }

    #[tokio::test]
    async fn deadline_is_forwarded() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_json(AGENT, &json!({"content": "c", "reasoning": "r", "confidence": 0.8}))
            .await;
        let draft = SynthesisAgent::new(llm.clone())
            .synthesize(
                "q",
                &Persona::neutral(),
                &[],
                &[],
                &ConsensusResult::advisory_fallback(),
                Some("s1"),
                Some(Deadline::after(Duration::from_secs(7))),
            )
            .await
            .unwrap();
        assert_eq!(draft.content, "c");
        let req = &llm.requests().await[0];
        let deadline = req.deadline.expect("deadline forwarded");
        assert_eq!(deadline.budget(), Duration::from_secs(7));
    }
}
