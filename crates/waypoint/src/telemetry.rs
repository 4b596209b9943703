// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber and Prometheus recorder setup.

use std::sync::Arc;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use waypoint_gateway::MetricsRender;

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("waypoint={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Register metric descriptions.
fn register_metrics() {
    describe_counter!("waypoint_llm_calls_total", "LLM calls by agent and outcome");
    describe_histogram!("waypoint_llm_latency_seconds", "LLM call latency by agent");
    describe_counter!("waypoint_db_calls_total", "Database calls by operation and outcome");
    describe_histogram!("waypoint_db_latency_seconds", "Database call latency by operation");
    describe_counter!("waypoint_retries_total", "Retried outbound calls by service");
    describe_counter!(
        "waypoint_recommendations_total",
        "Recommendations by outcome (ok, degraded, fallback)"
    );
    describe_counter!("waypoint_request_mode_total", "Requests by cold or warm start");
    describe_histogram!(
        "waypoint_recommendation_latency_seconds",
        "End-to-end recommendation latency in seconds"
    );
    describe_counter!("waypoint_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("waypoint_ingest_items_total", "Ingested media items by outcome");
    describe_counter!("waypoint_knowledge_indexed_total", "Knowledge entries written");
    describe_counter!("waypoint_milestones_total", "Milestone checks by outcome");
}

/// Install the Prometheus recorder. `None` when one is already installed.
pub fn install_metrics() -> Option<MetricsRender> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metrics();
            info!("prometheus metrics recorder installed");
            Some(Arc::new(move || handle.render()))
        }
        Err(e) => {
            warn!(error = %e, "failed to install Prometheus recorder, /metrics disabled");
            None
        }
    }
}
