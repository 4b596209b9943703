// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Developer memory for Waypoint.
//!
//! - [`KnowledgeIndexer`] summarises problems into the knowledge store and
//!   finds related entries by embedding similarity.
//! - [`Scribe`] writes dated Markdown design logs for milestones.

pub mod indexer;
pub mod scribe;

pub use indexer::{KnowledgeIndexer, RecallSettings, parse_summary};
pub use scribe::{Milestone, MilestoneVerdict, Scribe};
