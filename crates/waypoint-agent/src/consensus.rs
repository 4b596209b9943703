// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisory consensus between a persona and the retrieved candidates.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use waypoint_core::persona::{Persona, clamp_unit};
use waypoint_core::recommendation::ConsensusResult;
use waypoint_core::traits::{GenerateRequest, LlmProvider};
use waypoint_core::types::Candidate;
use waypoint_core::{Deadline, WaypointError, extract_json};
use waypoint_resilience::bounded;

use crate::prompts::consensus_prompt;

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "consensus";

fn id_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().trim_matches(['[', ']']).to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().trim_matches(['[', ']']).to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

/// Normalise the judge's JSON. The score is required; everything else has
/// a default.
pub fn parse_consensus(value: &Value) -> Result<ConsensusResult, WaypointError> {
    let obj = value
        .as_object()
        .ok_or_else(|| WaypointError::parse("consensus is not a JSON object"))?;

    let score = ["consensus_score", "score"]
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .map(|s| clamp_unit(s as f32))
        .ok_or_else(|| WaypointError::parse("consensus has no numeric score"))?;

    let is_validated = match obj.get("is_validated") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => score >= 0.5,
    };

    Ok(ConsensusResult {
        score,
        is_validated,
        critique: text(obj.get("critique")),
        top_matches: id_list(obj.get("top_matches")),
        refining_instructions: text(obj.get("refining_instructions")),
        fallback: false,
    })
}

/// Asks the judge model to score persona/candidate alignment.
pub struct ConsensusAgent {
    llm: Arc<dyn LlmProvider>,
}

impl ConsensusAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Advisory: any non-fatal failure, `deadline` passing included, yields
    /// [`ConsensusResult::advisory_fallback`].
    pub async fn validate(
        &self,
        persona: &Persona,
        posts: &[Candidate],
        media: &[Candidate],
        session_id: Option<&str>,
        deadline: Option<Deadline>,
    ) -> Result<ConsensusResult, WaypointError> {
        let mut request = GenerateRequest::new(AGENT, consensus_prompt(persona, posts, media))
            .expect_json()
            .with_session(session_id.map(str::to_string));
        if let Some(deadline) = deadline {
            request = request.with_deadline(deadline);
        }

        let generated = bounded(AGENT, deadline.as_ref(), self.llm.generate(request)).await;
        let result = match generated {
            Ok(generation) => extract_json(&generation.text).and_then(|v| parse_consensus(&v)),
            Err(e) => Err(e),
        };

        match result {
            Ok(consensus) => {
                debug!(
                    score = consensus.score,
                    validated = consensus.is_validated,
                    top_matches = consensus.top_matches.len(),
                    "consensus reached"
                );
                Ok(consensus)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "consensus degraded to advisory fallback");
                Ok(ConsensusResult::advisory_fallback())
            }
        }
    }
}
