// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Waypoint integration tests.
//!
//! Provides scripted and in-memory adapters plus an orchestrator harness
//! for fast, deterministic tests without Gemini or Supabase.
//!
//! # Components
//!
//! - [`ScriptedLlm`] - LLM provider answering from per-agent queues
//! - [`InMemoryIndex`], [`InMemorySignalStore`], [`InMemoryKnowledgeStore`],
//!   [`InMemoryObjectStorage`] - store doubles
//! - [`GatedLlm`], [`GatedSignalStore`] - gate-holding wrappers that record
//!   peak concurrency
//! - [`TestHarness`] - a wired orchestrator with seeding helpers

pub mod gated;
pub mod harness;
pub mod scripted_llm;
pub mod stores;

pub use gated::{GatedLlm, GatedSignalStore, InFlight};
pub use harness::{HARNESS_THRESHOLD, TestHarness, TestHarnessBuilder};
pub use scripted_llm::{SCRIPTED_MODEL, Script, ScriptedLlm, bag_of_words, cosine};
pub use stores::{
    InMemoryIndex, InMemoryKnowledgeStore, InMemoryObjectStorage, InMemorySignalStore,
    RecordingUsageSink,
};
