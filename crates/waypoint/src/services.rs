// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the concrete adapters from configuration and secrets.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};
use waypoint_config::{ResolvedSecrets, WaypointConfig};
use waypoint_core::{HealthStatus, LlmProvider, PluginAdapter, WaypointError};
use waypoint_gemini::GeminiGateway;
use waypoint_resilience::{Gates, RetryPolicy};
use waypoint_supabase::SupabaseStore;

/// Shared adapters, one set per process.
pub struct Services {
    pub llm: Arc<dyn LlmProvider>,
    pub store: Arc<SupabaseStore>,
    pub retry: RetryPolicy,
}

impl Services {
    pub fn build(config: &WaypointConfig, secrets: &ResolvedSecrets) -> Result<Self, WaypointError> {
        let retry = RetryPolicy::from_config(&config.retry);
        let gates = Gates::from_config(&config.concurrency);

        let store = Arc::new(SupabaseStore::from_config(
            &config.supabase,
            secrets,
            retry.clone(),
            gates.db.clone(),
        )?);
        let gateway = GeminiGateway::new(
            &config.gemini,
            SecretString::from(secrets.gemini_api_key.clone()),
            retry.clone(),
            gates.llm.clone(),
        )?
        .with_usage_sink(store.clone());

        if secrets.tavily_api_key.is_none() {
            info!("no web search key configured, web scouting disabled");
        }

        Ok(Self {
            llm: Arc::new(gateway),
            store,
            retry,
        })
    }

    /// Health-check every adapter once; problems are logged, not fatal.
    pub async fn check_health(&self) {
        let results = [
            ("llm", self.llm.health_check().await),
            ("supabase", self.store.health_check().await),
        ];
        for (name, result) in results {
            match result {
                Ok(HealthStatus::Healthy) => info!(adapter = name, "adapter healthy"),
                Ok(status) => warn!(adapter = name, status = ?status, "adapter not healthy"),
                Err(e) => warn!(adapter = name, kind = %e.kind(), error = %e, "adapter health check failed"),
            }
        }
    }
}
