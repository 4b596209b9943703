// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response shapes produced by the reasoning pipeline.

use serde::{Deserialize, Serialize};

/// Reasoning string attached to every fallback response.
pub const FALLBACK_REASONING: &str = "Fallback response due to generation error.";

/// Confidence attached to every fallback response.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Critique attached to the advisory consensus fallback.
pub const JUDGE_ERROR_CRITIQUE: &str = "judge system error";

/// The public recommendation payload. Its shape never varies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub content: String,
    pub reasoning: String,
    pub confidence: f32,
    pub constraints: Vec<String>,
    #[serde(rename = "lifestyleVibe")]
    pub lifestyle_vibe: String,
}

impl Recommendation {
    /// The canonical degraded response for a query.
    pub fn fallback(query: &str) -> Self {
        Self {
            content: format!("Here are some results for {query}"),
            reasoning: FALLBACK_REASONING.into(),
            confidence: FALLBACK_CONFIDENCE,
            constraints: Vec::new(),
            lifestyle_vibe: "General".into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.reasoning == FALLBACK_REASONING && self.lifestyle_vibe == "General"
    }
}

/// Advisory alignment between a persona and the retrieved candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub score: f32,
    pub is_validated: bool,
    pub critique: String,
    pub top_matches: Vec<String>,
    pub refining_instructions: String,
    /// True when the judge could not be consulted.
    #[serde(default)]
    pub fallback: bool,
}

impl ConsensusResult {
    /// Result used when the judge fails. Advisory, so it never blocks synthesis.
    pub fn advisory_fallback() -> Self {
        Self {
            score: 0.5,
            is_validated: true,
            critique: JUDGE_ERROR_CRITIQUE.into(),
            top_matches: Vec::new(),
            refining_instructions: String::new(),
            fallback: true,
        }
    }
}
