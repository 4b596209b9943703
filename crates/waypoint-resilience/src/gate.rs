// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named process-wide concurrency gates.
//!
//! A gate is a fair semaphore shared by every caller of one external service.
//! Permits are owned guards, so release happens on every exit path including
//! cancellation.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;
use waypoint_config::model::ConcurrencyConfig;
use waypoint_core::WaypointError;

/// A named semaphore bounding in-flight calls to one service.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    name: &'static str,
    permits: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(name: &'static str, permits: usize) -> Self {
        Self {
            name,
            permits,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Configured capacity.
    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits (fairly) for a permit. The permit is released when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, WaypointError> {
        trace!(gate = self.name, available = self.available(), "acquiring permit");
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WaypointError::Internal(format!("gate `{}` is closed", self.name)))
    }
}

/// The two process-wide gates.
#[derive(Debug, Clone)]
pub struct Gates {
    pub llm: ConcurrencyGate,
    pub db: ConcurrencyGate,
}

impl Gates {
    pub fn new(llm_permits: usize, db_permits: usize) -> Self {
        Self {
            llm: ConcurrencyGate::new("llm", llm_permits),
            db: ConcurrencyGate::new("db", db_permits),
        }
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Self {
        Self::new(config.llm_permits, config.db_permits)
    }
}

impl Default for Gates {
    fn default() -> Self {
        Self::from_config(&ConcurrencyConfig::default())
    }
}
