// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous facade over an [`LlmProvider`] for callers without a runtime.
//!
//! The facade owns a current-thread runtime, so it must not be used from
//! inside an async context.

use std::sync::Arc;

use waypoint_core::WaypointError;
use waypoint_core::traits::{EmbedRequest, GenerateRequest, Generation, LlmProvider};

/// Blocking wrapper that drives the async gateway on its own runtime.
pub struct BlockingGateway {
    runtime: tokio::runtime::Runtime,
    inner: Arc<dyn LlmProvider>,
}

impl BlockingGateway {
    pub fn new(inner: Arc<dyn LlmProvider>) -> Result<Self, WaypointError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| WaypointError::Internal(format!("failed to build runtime: {e}")))?;
        Ok(Self { runtime, inner })
    }

    pub fn generate(&self, request: GenerateRequest) -> Result<Generation, WaypointError> {
        self.runtime.block_on(self.inner.generate(request))
    }

    pub fn embed(&self, request: EmbedRequest) -> Result<Vec<f32>, WaypointError> {
        self.runtime.block_on(self.inner.embed(request))
    }
}
