// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supabase data plane for Waypoint.
//!
//! [`SupabaseStore`] implements the signal store, vector index, knowledge
//! store, object storage, and usage sink traits over PostgREST and Storage.
//! Every call holds a `db` gate permit per attempt and goes through the
//! shared retry policy.

pub mod client;
pub mod rows;
pub mod store;

pub use client::{SERVICE, SupabaseClient};
pub use store::{SupabaseStore, bound_candidates};
