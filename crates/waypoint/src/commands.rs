// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;
use waypoint_agent::{Orchestrator, OrchestratorSettings};
use waypoint_config::{ResolvedSecrets, WaypointConfig};
use waypoint_core::WaypointError;
use waypoint_gateway::GatewayState;
use waypoint_ingest::{Downloader, IngestPipeline, IngestSettings, load_manifest};
use waypoint_memory::{KnowledgeIndexer, Milestone, RecallSettings, Scribe};

use crate::services::Services;
use crate::telemetry;

fn parse_json_arg(flag: &str, raw: Option<&str>) -> Result<Option<Value>, WaypointError> {
    raw.map(|raw| {
        serde_json::from_str(raw)
            .map_err(|e| WaypointError::bad_request("cli", format!("--{flag} is not valid JSON: {e}")))
    })
    .transpose()
}

/// `waypoint serve`
pub async fn serve(config: &WaypointConfig, secrets: &ResolvedSecrets) -> Result<(), WaypointError> {
    let render = telemetry::install_metrics();
    let services = Services::build(config, secrets)?;
    services.check_health().await;

    let orchestrator = Orchestrator::new(
        services.llm.clone(),
        services.store.clone(),
        services.store.clone(),
        OrchestratorSettings::from_config(&config.orchestrator),
    );
    let mut state = GatewayState::new(Arc::new(orchestrator), &config.server);
    if let Some(render) = render {
        state = state.with_metrics(render);
    }

    let shutdown = waypoint_gateway::install_signal_handler();
    waypoint_gateway::serve(&config.server, state, shutdown).await
}

/// `waypoint ingest <manifest>`
pub async fn ingest(
    config: &WaypointConfig,
    secrets: &ResolvedSecrets,
    manifest: &Path,
) -> Result<(), WaypointError> {
    let items = load_manifest(manifest).await?;
    let services = Services::build(config, secrets)?;
    let downloader = Downloader::new(
        Duration::from_secs(config.ingest.download_timeout_secs),
        services.retry.clone(),
    )?;
    let pipeline = IngestPipeline::new(
        downloader,
        services.llm.clone(),
        services.store.clone(),
        services.store.clone(),
        IngestSettings::from_config(&config.ingest),
    );

    let report = pipeline.run(&items).await;

    for asset in &report.succeeded {
        println!("ok      {}  {}", asset.storage_path, asset.title);
    }
    for failed in &report.failed {
        println!("failed  {}  [{}] {}", failed.url, failed.kind, failed.message);
    }
    println!(
        "{} succeeded, {} failed, {} not attempted",
        report.succeeded.len(),
        report.failed.len(),
        items.len() - report.total()
    );

    if report.is_clean() {
        Ok(())
    } else {
        Err(WaypointError::Internal(format!(
            "{} of {} items were not ingested",
            items.len() - report.succeeded.len(),
            items.len()
        )))
    }
}

/// `waypoint remember <text>`
pub async fn remember(
    config: &WaypointConfig,
    secrets: &ResolvedSecrets,
    text: &str,
    metadata: Option<&str>,
) -> Result<(), WaypointError> {
    let metadata = parse_json_arg("metadata", metadata)?;
    let services = Services::build(config, secrets)?;
    let indexer = KnowledgeIndexer::new(services.llm.clone(), services.store.clone());
    let id = indexer.index_problem(text, metadata).await?;
    println!("{id}");
    Ok(())
}

/// `waypoint recall <query>`
pub async fn recall(
    config: &WaypointConfig,
    secrets: &ResolvedSecrets,
    query: &str,
    threshold: Option<f32>,
    limit: Option<usize>,
) -> Result<(), WaypointError> {
    let defaults = RecallSettings::from_config(&config.memory);
    let threshold = threshold.unwrap_or(defaults.threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(WaypointError::bad_request("cli", "--threshold must be between 0 and 1"));
    }

    let services = Services::build(config, secrets)?;
    let indexer = KnowledgeIndexer::new(services.llm.clone(), services.store.clone());
    let entries = indexer
        .find_related(query, threshold, limit.unwrap_or(defaults.top_k))
        .await?;

    if entries.is_empty() {
        println!("no related entries at threshold {threshold:.2}");
    }
    for entry in entries {
        println!(
            "{:.3}  {}",
            entry.similarity.unwrap_or_default(),
            entry.title
        );
        if !entry.solution.is_empty() {
            println!("       {}", entry.solution);
        }
    }
    Ok(())
}

/// `waypoint milestone <summary>`
pub async fn milestone(
    config: &WaypointConfig,
    secrets: &ResolvedSecrets,
    summary: &str,
    state: Option<&str>,
) -> Result<(), WaypointError> {
    let state = parse_json_arg("state", state)?.unwrap_or(Value::Null);
    let services = Services::build(config, secrets)?;
    let scribe = Scribe::new(services.llm.clone(), &config.memory.design_log_dir);
    match scribe.track_milestone(summary, &state).await? {
        Milestone::Logged { path, title } => println!("logged {title} -> {}", path.display()),
        Milestone::Skipped { reason } => println!("skipped: {reason}"),
    }
    Ok(())
}

/// `waypoint check-config`; returns the process exit code.
pub fn check_config(config: &WaypointConfig) -> i32 {
    info!("configuration loaded and validated");
    println!("config: ok");
    println!(
        "  server: {}:{} (rate limit {}/min)",
        config.server.bind_address, config.server.port, config.server.rate_limit_per_minute
    );
    println!(
        "  gemini: generation={} embedding={}",
        config.gemini.generation_model, config.gemini.embedding_model
    );
    println!(
        "  orchestrator: deadline={}s top_k={}",
        config.orchestrator.deadline_secs, config.orchestrator.top_k
    );

    match waypoint_config::require_secrets(config) {
        Ok(secrets) => {
            println!("secrets: ok (database key: {:?})", secrets.supabase_key_kind);
            if secrets.tavily_api_key.is_none() {
                println!("  web search key absent, web scouting disabled");
            }
            0
        }
        Err(errors) => {
            waypoint_config::render_errors(&errors);
            1
        }
    }
}
