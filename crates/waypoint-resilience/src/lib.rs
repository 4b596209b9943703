// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives shared by every outbound client.
//!
//! - [`RetryPolicy`]: exponential backoff with jitter, retrying only
//!   retriable failures and never past a request [`Deadline`].
//! - [`attempt_timeout`] / [`bounded`]: fit one attempt inside a deadline.
//! - [`Gates`]: the process-wide `llm` and `db` concurrency gates.
//! - [`classify_http_status`] / [`classify_transport`]: the single mapping
//!   from HTTP outcomes to the error taxonomy.

pub mod classify;
pub mod deadline;
pub mod gate;
pub mod retry;

pub use classify::{classify_http_status, classify_transport, is_transient_status};
pub use deadline::{Deadline, attempt_timeout, bounded};
pub use gate::{ConcurrencyGate, Gates};
pub use retry::RetryPolicy;
