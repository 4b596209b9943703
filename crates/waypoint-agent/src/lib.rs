// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning pipeline for Waypoint.
//!
//! Four single-purpose agents (persona inference, semantic retrieval,
//! consensus, synthesis) are driven by the [`Orchestrator`] state machine.
//! Every agent absorbs non-fatal failures into a local fallback; only
//! `auth` and `bad_request` errors reach the orchestrator, which answers
//! with the fallback payload.

pub mod consensus;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod retrieval;
pub mod synthesis;

pub use consensus::{ConsensusAgent, parse_consensus};
pub use orchestrator::{
    Orchestrator, OrchestratorSettings, RecommendRequest, RecommendationOutcome, Stage,
    StreamEvent, Trace,
};
pub use persona::{PersonaAgent, PersonaInference, SignalDigest, summarize_signals};
pub use retrieval::{Retrieval, RetrievalAgent, enriched_query};
pub use synthesis::{Draft, SynthesisAgent};
