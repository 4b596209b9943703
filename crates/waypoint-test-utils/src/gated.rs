// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters that hold a [`ConcurrencyGate`] permit per call, the way the
//! real gateways do, and record how many calls overlapped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use waypoint_core::WaypointError;
use waypoint_core::traits::{
    EmbedRequest, GenerateRequest, Generation, LlmProvider, PluginAdapter, SignalStore,
};
use waypoint_core::types::{AdapterType, HealthStatus, Signal};
use waypoint_resilience::ConcurrencyGate;

/// Current and peak number of overlapping calls.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    /// Highest overlap seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps an [`LlmProvider`]; every generation and embedding holds an `llm`
/// permit for at least `hold`.
pub struct GatedLlm {
    inner: Arc<dyn LlmProvider>,
    gate: ConcurrencyGate,
    hold: Duration,
    in_flight: InFlight,
}

impl GatedLlm {
    pub fn new(inner: Arc<dyn LlmProvider>, gate: ConcurrencyGate) -> Self {
        Self {
            inner,
            gate,
            hold: Duration::ZERO,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

#[async_trait]
impl PluginAdapter for GatedLlm {
    fn name(&self) -> &str {
        "gated-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl LlmProvider for GatedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, WaypointError> {
        let _permit = self.gate.acquire().await?;
        let _guard = self.in_flight.enter();
        tokio::time::sleep(self.hold).await;
        self.inner.generate(request).await
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Vec<f32>, WaypointError> {
        let _permit = self.gate.acquire().await?;
        let _guard = self.in_flight.enter();
        tokio::time::sleep(self.hold).await;
        self.inner.embed(request).await
    }
}

/// Wraps a [`SignalStore`]; every call holds a `db` permit for at least `hold`.
pub struct GatedSignalStore {
    inner: Arc<dyn SignalStore>,
    gate: ConcurrencyGate,
    hold: Duration,
    in_flight: InFlight,
}

impl GatedSignalStore {
    pub fn new(inner: Arc<dyn SignalStore>, gate: ConcurrencyGate) -> Self {
        Self {
            inner,
            gate,
            hold: Duration::ZERO,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

#[async_trait]
impl PluginAdapter for GatedSignalStore {
    fn name(&self) -> &str {
        "gated-signals"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SignalStore
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl SignalStore for GatedSignalStore {
    async fn recent_signals(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Signal>, WaypointError> {
        let _permit = self.gate.acquire().await?;
        let _guard = self.in_flight.enter();
        tokio::time::sleep(self.hold).await;
        self.inner.recent_signals(session_id, limit).await
    }

    async fn append_signal(&self, signal: &Signal) -> Result<(), WaypointError> {
        let _permit = self.gate.acquire().await?;
        let _guard = self.in_flight.enter();
        self.inner.append_signal(signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedLlm;

    #[tokio::test(start_paused = true)]
    async fn peak_never_exceeds_permits() {
        let llm = Arc::new(
            GatedLlm::new(Arc::new(ScriptedLlm::new()), ConcurrencyGate::new("llm", 2))
                .with_hold(Duration::from_millis(10)),
        );
        let mut set = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let llm = llm.clone();
            set.spawn(async move { llm.embed(EmbedRequest::query("retrieval", "fjords")).await });
        }
        while let Some(result) = set.join_next().await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(llm.in_flight().peak(), 2);
    }
}
