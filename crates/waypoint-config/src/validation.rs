// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as similarity thresholds in `[0, 1]` and non-zero gate sizes.

use crate::diagnostic::ConfigError;
use crate::model::WaypointConfig;

fn check_unit(errors: &mut Vec<ConfigError>, key: &str, value: f32) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::Validation {
            message: format!("{key} must be within [0, 1], got {value}"),
        });
    }
}

fn check_nonzero(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::Validation {
            message: format!("{key} must be at least 1"),
        });
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WaypointConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.bind_address must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }
    check_nonzero(
        &mut errors,
        "server.rate_limit_per_minute",
        config.server.rate_limit_per_minute.into(),
    );
    check_nonzero(&mut errors, "server.stream_buffer", config.server.stream_buffer as u64);

    check_nonzero(
        &mut errors,
        "gemini.connect_timeout_secs",
        config.gemini.connect_timeout_secs,
    );
    check_nonzero(
        &mut errors,
        "gemini.generate_timeout_secs",
        config.gemini.generate_timeout_secs,
    );
    check_nonzero(
        &mut errors,
        "gemini.embed_timeout_secs",
        config.gemini.embed_timeout_secs,
    );
    if config.supabase.schema.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "supabase.schema must not be empty".to_string(),
        });
    }

    check_nonzero(
        &mut errors,
        "concurrency.llm_permits",
        config.concurrency.llm_permits as u64,
    );
    check_nonzero(
        &mut errors,
        "concurrency.db_permits",
        config.concurrency.db_permits as u64,
    );

    let retry = &config.retry;
    check_nonzero(&mut errors, "retry.max_attempts", retry.max_attempts.into());
    if retry.multiplier < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!("retry.multiplier must be at least 1.0, got {}", retry.multiplier),
        });
    }
    if retry.jitter_min < 0.0 || retry.jitter_min > retry.jitter_max {
        errors.push(ConfigError::Validation {
            message: format!(
                "retry jitter bounds must satisfy 0 <= jitter_min <= jitter_max, got [{}, {}]",
                retry.jitter_min, retry.jitter_max
            ),
        });
    }

    let orch = &config.orchestrator;
    check_nonzero(&mut errors, "orchestrator.deadline_secs", orch.deadline_secs);
    check_nonzero(&mut errors, "orchestrator.persona_budget_secs", orch.persona_budget_secs);
    check_nonzero(&mut errors, "orchestrator.validate_budget_secs", orch.validate_budget_secs);
    if orch.persona_budget_secs >= orch.deadline_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "orchestrator.persona_budget_secs ({}) must be shorter than deadline_secs ({})",
                orch.persona_budget_secs, orch.deadline_secs
            ),
        });
    }
    check_unit(&mut errors, "orchestrator.post_threshold", orch.post_threshold);
    check_unit(&mut errors, "orchestrator.media_threshold", orch.media_threshold);
    check_nonzero(&mut errors, "orchestrator.top_k", orch.top_k as u64);

    check_unit(&mut errors, "memory.threshold", config.memory.threshold);
    check_nonzero(&mut errors, "memory.top_k", config.memory.top_k as u64);

    let ingest = &config.ingest;
    check_nonzero(&mut errors, "ingest.batch_size", ingest.batch_size as u64);
    check_nonzero(&mut errors, "ingest.max_concurrency", ingest.max_concurrency as u64);
    check_nonzero(&mut errors, "ingest.max_width", ingest.max_width.into());
    if !(1..=100).contains(&ingest.jpeg_quality) {
        errors.push(ConfigError::Validation {
            message: format!(
                "ingest.jpeg_quality must be within 1..=100, got {}",
                ingest.jpeg_quality
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
