// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-scoped deadlines.
//!
//! A [`Deadline`] travels two ways: explicitly on a
//! [`GenerateRequest`](crate::traits::GenerateRequest) or
//! [`EmbedRequest`](crate::traits::EmbedRequest) when a stage needs a tighter
//! budget, and ambiently through [`Deadline::scope`] so store calls made
//! anywhere inside a request see the request deadline without it appearing
//! in every trait signature.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

tokio::task_local! {
    static CURRENT: Deadline;
}

/// A fixed point in time by which a request must finish.
///
/// Built on `tokio::time::Instant` so paused-clock tests can advance it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// A deadline `budget` from now, but never later than `self`.
    pub fn narrowed(&self, budget: Duration) -> Self {
        Self::after(budget.min(self.remaining()))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The instant the deadline expires, for `tokio::time::timeout_at`.
    pub fn instant(&self) -> Instant {
        self.started + self.budget
    }

    /// Runs `fut` with `self` as the ambient deadline seen by [`Deadline::current`].
    ///
    /// The value does not cross `tokio::spawn`.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// The deadline of the innermost enclosing [`Deadline::scope`].
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|deadline| *deadline).ok()
    }
}
