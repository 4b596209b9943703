// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic retrieval of posts and images for a persona.

use std::sync::Arc;

use tracing::{debug, warn};
use waypoint_core::persona::Persona;
use waypoint_core::traits::{EmbedRequest, LlmProvider, VectorIndex};
use waypoint_core::types::{Candidate, CandidateKind};
use waypoint_core::WaypointError;

/// Agent name used for usage accounting.
pub const AGENT: &str = "retrieval";

/// Keywords carried into the enriched query.
pub const MAX_QUERY_KEYWORDS: usize = 5;

/// Colour and lighting hints by vibe keyword.
const VISUAL_HINTS: &[(&[&str], &str)] = &[
    (
        &["slow", "quiet", "calm", "serene", "village", "retreat", "wellness"],
        "soft morning light, muted earthy tones",
    ),
    (
        &["luxury", "elegant", "boutique", "refined", "premium"],
        "golden hour, warm rich textures",
    ),
    (
        &["adventure", "mountain", "alpine", "hiking", "wild", "nomad"],
        "dramatic natural light, deep greens and greys",
    ),
    (
        &["beach", "coast", "island", "ocean", "surf", "tropical"],
        "bright daylight, turquoise and sand tones",
    ),
    (
        &["city", "urban", "night", "nightlife", "food", "street"],
        "neon night lights, high contrast",
    ),
];

const DEFAULT_VISUAL_HINT: &str = "natural light, balanced colours";

/// Short colour/lighting tokens derived from the persona's vibe.
pub fn visual_tokens(vibe: &str) -> &'static str {
    let words: Vec<String> = vibe
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .collect();
    VISUAL_HINTS
        .iter()
        .find(|(keys, _)| words.iter().any(|w| keys.contains(&w.as_str())))
        .map(|(_, hint)| *hint)
        .unwrap_or(DEFAULT_VISUAL_HINT)
}

/// Raw query plus vibe and top keywords; media queries also carry visual tokens.
pub fn enriched_query(query: &str, persona: &Persona, kind: CandidateKind) -> String {
    let mut parts = vec![query.trim().to_string(), format!("vibe: {}", persona.vibe)];
    let keywords: Vec<&str> = persona
        .keywords
        .iter()
        .map(String::as_str)
        .take(MAX_QUERY_KEYWORDS)
        .collect();
    if !keywords.is_empty() {
        parts.push(format!("keywords: {}", keywords.join(", ")));
    }
    if kind == CandidateKind::Media {
        parts.push(format!("visual: {}", visual_tokens(&persona.vibe)));
    }
    parts.join(" | ")
}

/// One retrieval's candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub candidates: Vec<Candidate>,
    /// True when embedding or search failed and the list is empty by force.
    pub degraded: bool,
}

/// Embeds an enriched query and searches the vector index.
pub struct RetrievalAgent {
    llm: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
}

impl RetrievalAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { llm, index }
    }

    /// Never more than `k` candidates and none below `threshold`. Non-fatal
    /// failures yield an empty, degraded result.
    pub async fn retrieve(
        &self,
        query: &str,
        persona: &Persona,
        kind: CandidateKind,
        threshold: f32,
        k: usize,
    ) -> Result<Retrieval, WaypointError> {
        let text = enriched_query(query, persona, kind);
        let result = self.search(&text, kind, threshold, k).await;
        match result {
            Ok(mut candidates) => {
                candidates.retain(|c| c.similarity >= threshold);
                candidates.truncate(k);
                debug!(kind = %kind, count = candidates.len(), threshold, k, "retrieval complete");
                Ok(Retrieval {
                    candidates,
                    degraded: false,
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(kind = %kind, kind_of_error = %e.kind(), error = %e, "retrieval degraded to empty");
                Ok(Retrieval {
                    candidates: Vec::new(),
                    degraded: true,
                })
            }
        }
    }

    async fn search(
        &self,
        text: &str,
        kind: CandidateKind,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<Candidate>, WaypointError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.llm.embed(EmbedRequest::query(AGENT, text)).await?;
        if vector.is_empty() {
            return Err(WaypointError::upstream(AGENT, "empty query embedding"));
        }
        match kind {
            CandidateKind::Post => self.index.fetch_posts_by_vector(&vector, threshold, k).await,
            CandidateKind::Media => self.index.fetch_media_by_vector(&vector, threshold, k).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use waypoint_core::persona::{BudgetTier, Pace, SocialDensity};
    use waypoint_core::types::MediaAsset;
    use waypoint_test_utils::{InMemoryIndex, ScriptedLlm, bag_of_words};

    use super::*;

    fn persona() -> Persona {
        Persona {
            vibe: "Alpine Slow Living".into(),
            budget_tier: BudgetTier::MidRange,
            pace: Pace::Slow,
            social_density: SocialDensity::Low,
            intent: String::new(),
            confidence: 0.8,
            keywords: vec!["village", "mountain", "quiet", "hiking", "lakes", "extra"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    #[test]
    fn visual_tokens_follow_vibe() {
        assert_eq!(visual_tokens("Coastal Island Hopper"), "bright daylight, turquoise and sand tones");
        assert_eq!(visual_tokens("Luxury Wellness"), "soft morning light, muted earthy tones");
        assert_eq!(visual_tokens("General Voyager"), DEFAULT_VISUAL_HINT);
    }

    #[test]
    fn enriched_query_shapes_differ_by_kind() {
        let p = persona();
        let post = enriched_query("slow living", &p, CandidateKind::Post);
        let media = enriched_query("slow living", &p, CandidateKind::Media);
        assert_eq!(
            post,
            "slow living | vibe: Alpine Slow Living | keywords: village, mountain, quiet, hiking, lakes"
        );
        assert!(media.starts_with(&post));
        assert!(media.ends_with("visual: soft morning light, muted earthy tones"));
    }

    fn asset(n: usize, text: &str) -> MediaAsset {
        MediaAsset {
            id: None,
            public_url: format!("https://cdn.test/{n}.jpg"),
            storage_path: format!("ingested/{n}.jpg"),
            title: text.into(),
            alt_text: text.into(),
            embedding: bag_of_words(text),
            ai_description: text.into(),
            semantic_tags: vec![],
            width: 100,
            height: 100,
            size_bytes: 1,
            source_url: String::new(),
            provider: "test".into(),
        }
    }

    #[tokio::test]
    async fn results_respect_k_and_threshold() {
        let llm = Arc::new(ScriptedLlm::new());
        let index = Arc::new(InMemoryIndex::new());
        for n in 0..6 {
            index
                .insert_media(&asset(n, "quiet mountain village soft morning light"))
                .await
                .unwrap();
        }
        index
            .insert_media(&asset(99, "neon rooftop party"))
            .await
            .unwrap();

        let agent = RetrievalAgent::new(llm.clone(), index);
        let out = agent
            .retrieve("quiet mountain village", &persona(), CandidateKind::Media, 0.3, 4)
            .await
            .unwrap();
        assert!(!out.degraded);
        assert_eq!(out.candidates.len(), 4);
        assert!(out.candidates.iter().all(|c| c.similarity >= 0.3));

        let embeds = llm.embed_requests().await;
        assert_eq!(embeds[0].task, waypoint_core::traits::EmbedTask::RetrievalQuery);
    }

    #[tokio::test]
    async fn transient_failure_is_empty_and_degraded() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.fail_embeddings_with(|| WaypointError::upstream("gemini", "503"))
            .await;
        let agent = RetrievalAgent::new(llm, Arc::new(InMemoryIndex::new()));
        let out = agent
            .retrieve("q", &persona(), CandidateKind::Post, 0.5, 5)
            .await
            .unwrap();
        assert!(out.degraded);
        assert!(out.candidates.is_empty());
    }

    #[tokio::test]
    async fn auth_failure_escapes() {
        let llm = Arc::new(ScriptedLlm::new());
        let index = Arc::new(InMemoryIndex::new());
        index
            .fail_posts_with(|| WaypointError::Auth {
                service: "supabase".into(),
                message: "bad key".into(),
            })
            .await;
        let err = RetrievalAgent::new(llm, index)
            .retrieve("q", &persona(), CandidateKind::Post, 0.5, 5)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
