// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Waypoint recommendation backend.
//!
//! This crate provides the entities, error taxonomy, and adapter traits used
//! throughout the workspace. Every client that talks to an external service
//! implements a trait defined here, so the reasoning pipeline can be
//! assembled from real clients or in-memory doubles alike.

pub mod deadline;
pub mod error;
pub mod json;
pub mod persona;
pub mod recommendation;
pub mod redact;
pub mod slug;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use deadline::Deadline;
pub use error::{ErrorKind, WaypointError};
pub use json::{extract_json, extract_json_as};
pub use persona::{BudgetTier, Pace, Persona, RequestMode, SocialDensity, blend_factor};
pub use recommendation::{ConsensusResult, Recommendation};
pub use redact::redact;
pub use slug::{MAX_SLUG_LEN, slugify};
pub use types::{
    AdapterType, Candidate, CandidateKind, EMBEDDING_DIM, EventType, HealthStatus,
    KnowledgeEntry, MediaAsset, Namespace, Post, PostStatus, Signal, TokenUsage, UsageRecord,
};

pub use traits::{
    EmbedRequest, EmbedTask, GenerateRequest, Generation, InlineImage, KnowledgeStore,
    LlmProvider, ObjectStorage, PluginAdapter, SignalStore, UsageSink, VectorIndex,
};
