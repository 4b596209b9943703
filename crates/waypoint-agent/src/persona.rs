// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona inference from a query and recent behaviour signals.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use waypoint_core::persona::{Persona, RequestMode};
use waypoint_core::traits::{GenerateRequest, LlmProvider};
use waypoint_core::types::Signal;
use waypoint_core::{Deadline, WaypointError, extract_json};
use waypoint_resilience::bounded;

use crate::prompts::persona_prompt;

/// Agent name used for usage accounting and model overrides.
pub const AGENT: &str = "persona";

const MAX_DETAIL_FIELDS: usize = 3;
const MAX_DETAIL_CHARS: usize = 40;

/// Compact, prompt-ready form of one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDigest {
    pub event_type: String,
    pub target: String,
    pub detail: String,
}

impl SignalDigest {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            event_type: signal.event_type.to_string(),
            target: signal
                .target_type
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "-".to_string()),
            detail: metadata_digest(&signal.metadata),
        }
    }

    pub fn render(&self) -> String {
        if self.detail.is_empty() {
            format!("{} {}", self.event_type, self.target)
        } else {
            format!("{} {} {{{}}}", self.event_type, self.target, self.detail)
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// First few scalar metadata fields as `key=value`, values shortened.
fn metadata_digest(metadata: &Value) -> String {
    let Some(obj) = metadata.as_object() else {
        return String::new();
    };
    obj.iter()
        .filter_map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(format!("{k}={}", truncate_chars(&rendered, MAX_DETAIL_CHARS)))
        })
        .take(MAX_DETAIL_FIELDS)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Digest of the `k` most recent signals. Input is most-recent first.
pub fn summarize_signals(signals: &[Signal], k: usize) -> Vec<SignalDigest> {
    signals.iter().take(k).map(SignalDigest::from_signal).collect()
}

/// Result of persona inference.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaInference {
    pub persona: Persona,
    /// True when the neutral fallback was used.
    pub degraded: bool,
}

/// Infers a [`Persona`] through the LLM gateway.
pub struct PersonaAgent {
    llm: Arc<dyn LlmProvider>,
    summary_signals: usize,
}

impl PersonaAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, summary_signals: usize) -> Self {
        Self {
            llm,
            summary_signals,
        }
    }

    /// Always yields a valid persona, falling back to the neutral one on
    /// any non-fatal failure, including `deadline` passing. Only `auth` and
    /// `bad_request` are returned.
    pub async fn infer(
        &self,
        query: &str,
        signals: &[Signal],
        mode: RequestMode,
        alpha: f32,
        session_id: Option<&str>,
        deadline: Option<Deadline>,
    ) -> Result<PersonaInference, WaypointError> {
        let digests = summarize_signals(signals, self.summary_signals);
        let prompt = persona_prompt(query, mode, alpha, &digests);
        let mut request = GenerateRequest::new(AGENT, prompt)
            .expect_json()
            .with_session(session_id.map(str::to_string));
        if let Some(deadline) = deadline {
            request = request.with_deadline(deadline);
        }

        let generated = bounded(AGENT, deadline.as_ref(), self.llm.generate(request)).await;
        let result = match generated {
            Ok(generation) => {
                extract_json(&generation.text).and_then(|value| Persona::from_value(&value))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(persona) => {
                debug!(
                    vibe = %persona.vibe,
                    budget = %persona.budget_tier,
                    pace = %persona.pace,
                    density = %persona.social_density,
                    confidence = persona.confidence,
                    "persona inferred"
                );
                Ok(PersonaInference {
                    persona,
                    degraded: false,
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "persona inference degraded to neutral persona");
                Ok(PersonaInference {
                    persona: Persona::neutral(),
                    degraded: true,
                })
            }
        }
    }
}
