// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for every external seam.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod index;
pub mod knowledge;
pub mod llm;
pub mod signals;
pub mod storage;
pub mod usage;

pub use adapter::PluginAdapter;
pub use index::VectorIndex;
pub use knowledge::KnowledgeStore;
pub use llm::{EmbedRequest, EmbedTask, GenerateRequest, Generation, InlineImage, LlmProvider};
pub use signals::{DEFAULT_SIGNAL_LIMIT, SignalStore};
pub use storage::ObjectStorage;
pub use usage::UsageSink;
