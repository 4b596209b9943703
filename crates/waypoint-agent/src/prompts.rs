// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-shape prompt templates for the pipeline's model calls.

use std::fmt::Write;

use waypoint_core::persona::{Persona, RequestMode};
use waypoint_core::recommendation::ConsensusResult;
use waypoint_core::types::Candidate;

use crate::persona::SignalDigest;

/// Candidates per kind shown to the judge.
pub const JUDGE_TOP_N: usize = 3;

/// Candidates per kind shown to the writer.
pub const SYNTHESIS_TOP_N: usize = 5;

/// Persona inference prompt. States the mode and blend factor, lists the
/// enum domains, and demands a strict JSON object.
pub fn persona_prompt(
    query: &str,
    mode: RequestMode,
    alpha: f32,
    signals: &[SignalDigest],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You infer the travel lifestyle persona of a website visitor."
    );
    let _ = writeln!(prompt, "MODE: {mode}");
    let _ = writeln!(
        prompt,
        "ALPHA: {alpha:.2} (1.00 = rely only on the query, 0.00 = rely only on behaviour signals)"
    );
    let _ = writeln!(prompt, "QUERY: {}", query.trim());
    let _ = writeln!(prompt);

    if signals.is_empty() {
        let _ = writeln!(
            prompt,
            "There are no behaviour signals. Infer the persona from the query alone."
        );
    } else {
        let _ = writeln!(prompt, "RECENT SIGNALS (most recent first):");
        for (i, digest) in signals.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, digest.render());
        }
        let _ = writeln!(
            prompt,
            "Weight the signals by {:.2} and the query by {alpha:.2}.",
            1.0 - alpha
        );
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Respond with one JSON object and nothing else:");
    let _ = writeln!(prompt, "{{");
    let _ = writeln!(prompt, "  \"vibe\": short free-form lifestyle label,");
    let _ = writeln!(prompt, "  \"budget_tier\": \"Economy\" | \"Mid-range\" | \"Luxury\",");
    let _ = writeln!(prompt, "  \"pace\": \"Slow\" | \"Balanced\" | \"Fast\",");
    let _ = writeln!(prompt, "  \"social_density\": \"Low\" | \"Medium\" | \"High\",");
    let _ = writeln!(prompt, "  \"intent\": one or two sentences explaining the inference,");
    let _ = writeln!(prompt, "  \"confidence\": number between 0 and 1,");
    let _ = writeln!(prompt, "  \"keywords\": up to five search keywords");
    let _ = writeln!(prompt, "}}");
    if mode == RequestMode::WarmStart {
        let _ = writeln!(
            prompt,
            "The intent must cite the specific signals (by number) that drove the inference."
        );
    }
    prompt
}

fn persona_block(persona: &Persona) -> String {
    format!(
        "vibe: {}\nbudget: {}\npace: {}\nsocial density: {}\nkeywords: {}\nintent: {}",
        persona.vibe,
        persona.budget_tier,
        persona.pace,
        persona.social_density,
        persona.keywords.join(", "),
        persona.intent,
    )
}

fn post_line(c: &Candidate) -> String {
    format!(
        "- [{}] {} (category: {}; tags: {}; similarity {:.2})",
        c.id,
        c.title.as_deref().unwrap_or("untitled"),
        c.category.as_deref().unwrap_or("none"),
        if c.tags.is_empty() {
            "none".to_string()
        } else {
            c.tags.join(", ")
        },
        c.similarity,
    )
}

fn media_line(c: &Candidate) -> String {
    format!(
        "- [{}] {} (similarity {:.2})",
        c.id,
        c.alt_text
            .as_deref()
            .or(c.title.as_deref())
            .unwrap_or("no description"),
        c.similarity,
    )
}

fn candidate_section(out: &mut String, heading: &str, lines: Vec<String>) {
    let _ = writeln!(out, "{heading}:");
    if lines.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Consensus prompt: the persona plus the top posts and media.
pub fn consensus_prompt(persona: &Persona, posts: &[Candidate], media: &[Candidate]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You judge whether retrieved travel content fits a visitor persona."
    );
    let _ = writeln!(prompt, "PERSONA:\n{}", persona_block(persona));
    let _ = writeln!(prompt);
    candidate_section(
        &mut prompt,
        "POSTS",
        posts.iter().take(JUDGE_TOP_N).map(post_line).collect(),
    );
    candidate_section(
        &mut prompt,
        "IMAGES",
        media.iter().take(JUDGE_TOP_N).map(media_line).collect(),
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Respond with one JSON object and nothing else:");
    let _ = writeln!(prompt, "{{");
    let _ = writeln!(prompt, "  \"consensus_score\": number between 0 and 1,");
    let _ = writeln!(prompt, "  \"is_validated\": true if the content fits the persona,");
    let _ = writeln!(prompt, "  \"critique\": one sentence,");
    let _ = writeln!(prompt, "  \"top_matches\": ids (in brackets above) of the best items,");
    let _ = writeln!(prompt, "  \"refining_instructions\": how the answer should adjust");
    let _ = writeln!(prompt, "}}");
    prompt
}

/// Synthesis prompt: persona, candidates and the judge's critique.
pub fn synthesis_prompt(
    query: &str,
    persona: &Persona,
    posts: &[Candidate],
    media: &[Candidate],
    consensus: &ConsensusResult,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You write a short, personal travel recommendation for a website visitor."
    );
    let _ = writeln!(prompt, "QUERY: {}", query.trim());
    let _ = writeln!(prompt, "PERSONA:\n{}", persona_block(persona));
    let _ = writeln!(prompt);
    candidate_section(
        &mut prompt,
        "POSTS",
        posts.iter().take(SYNTHESIS_TOP_N).map(post_line).collect(),
    );
    candidate_section(
        &mut prompt,
        "IMAGES",
        media.iter().take(SYNTHESIS_TOP_N).map(media_line).collect(),
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "JUDGE: score {:.2}, validated {}. {}",
        consensus.score, consensus.is_validated, consensus.critique
    );
    if !consensus.refining_instructions.is_empty() {
        let _ = writeln!(prompt, "ADJUST: {}", consensus.refining_instructions);
    }
    if posts.is_empty() && media.is_empty() {
        let _ = writeln!(
            prompt,
            "Nothing matched in the archive; answer from general knowledge and say so."
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Respond with one JSON object and nothing else: {{\"content\": the recommendation, \"reasoning\": why it fits the persona, \"confidence\": number between 0 and 1}}"
    );
    prompt
}

#[cfg(test)]
mod tests {
    use waypoint_core::types::CandidateKind;

    use super::*;

    fn post(id: &str) -> Candidate {
        let mut c = Candidate::new(id, CandidateKind::Post, 0.8);
        c.title = Some(format!("Post {id}"));
        c
    }

    #[test]
    fn persona_prompt_states_mode_alpha_and_domains() {
        let p = persona_prompt("quiet villages", RequestMode::ColdStart, 1.0, &[]);
        assert!(p.contains("MODE: COLD_START"));
        assert!(p.contains("ALPHA: 1.00"));
        assert!(p.contains("\"Mid-range\""));
        assert!(p.contains("\"Balanced\""));
        assert!(p.contains("\"Medium\""));
        assert!(!p.contains("cite the specific signals"));
    }

    #[test]
    fn warm_prompt_lists_signals_and_asks_for_citations() {
        let digest = SignalDigest {
            event_type: "click".into(),
            target: "luxury_hotel".into(),
            detail: String::new(),
        };
        let p = persona_prompt("anything", RequestMode::WarmStart, 0.0, &[digest]);
        assert!(p.contains("1. click luxury_hotel"));
        assert!(p.contains("cite the specific signals"));
    }

    #[test]
    fn consensus_prompt_shows_at_most_three_per_kind() {
        let posts: Vec<_> = (0..5).map(|i| post(&i.to_string())).collect();
        let p = consensus_prompt(&Persona::neutral(), &posts, &[]);
        assert!(p.contains("[2]"));
        assert!(!p.contains("[3]"));
        assert!(p.contains("IMAGES:\n(none)"));
    }

    #[test]
    fn synthesis_prompt_flags_empty_archive() {
        let p = synthesis_prompt(
            "q",
            &Persona::neutral(),
            &[],
            &[],
            &ConsensusResult::advisory_fallback(),
        );
        assert!(p.contains("Nothing matched"));
        assert!(p.contains("judge system error"));
    }
}
