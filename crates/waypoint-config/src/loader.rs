// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./waypoint.toml` > `~/.config/waypoint/waypoint.toml`
//! > `/etc/waypoint/waypoint.toml`, with `WAYPOINT_` environment overrides and
//! the platform's conventional variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WaypointConfig;

/// Top-level sections, used to map `WAYPOINT_SECTION_KEY` to `section.key`.
pub const SECTIONS: &[&str] = &[
    "server",
    "gemini",
    "supabase",
    "search",
    "concurrency",
    "retry",
    "orchestrator",
    "memory",
    "ingest",
];

/// Conventional variables read without the `WAYPOINT_` prefix.
pub const PLATFORM_VARS: &[(&str, &str)] = &[
    ("SUPABASE_URL", "supabase.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "supabase.service_role_key"),
    ("SUPABASE_ANON_KEY", "supabase.anon_key"),
    ("GEMINI_API_KEY", "gemini.api_key"),
    ("TAVILY_API_KEY", "search.tavily_api_key"),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/waypoint/waypoint.toml` (system-wide)
/// 3. `~/.config/waypoint/waypoint.toml` (user XDG config)
/// 4. `./waypoint.toml` (local directory)
/// 5. `WAYPOINT_*` environment variables
/// 6. `SUPABASE_*`, `GEMINI_API_KEY`, `TAVILY_API_KEY`
pub fn load_config() -> Result<WaypointConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config file paths.
pub fn load_config_from_str(toml_content: &str) -> Result<WaypointConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaypointConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WaypointConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaypointConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(platform_env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(WaypointConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
        .merge(platform_env_provider())
}

/// The `waypoint.toml` locations, lowest precedence first.
///
/// The local file is resolved against the working directory so the path
/// matches what figment records as the error source.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/waypoint/waypoint.toml")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("waypoint").join("waypoint.toml"));
    }
    let local = Path::new("waypoint.toml");
    files.push(
        std::env::current_dir()
            .map(|cwd| cwd.join(local))
            .unwrap_or_else(|_| local.to_path_buf()),
    );
    files
}

/// Contents of every existing config file, keyed by display path.
pub fn read_config_sources(files: &[PathBuf]) -> Vec<(String, String)> {
    files
        .iter()
        .filter_map(|file| {
            std::fs::read_to_string(file)
                .ok()
                .map(|content| (file.display().to_string(), content))
        })
        .collect()
}

/// Map a prefix-stripped env key to a dotted config path.
///
/// Only the first `section_` is rewritten so keys containing underscores
/// survive: `gemini_api_key` becomes `gemini.api_key`, not `gemini.api.key`.
pub fn map_section_key(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = lower.strip_prefix(section) {
            if let Some(field) = rest.strip_prefix('_') {
                return format!("{section}.{field}");
            }
        }
    }
    lower
}

/// `WAYPOINT_*` variables with explicit section mapping.
fn env_provider() -> Env {
    Env::prefixed("WAYPOINT_").map(|key| map_section_key(key.as_str()).into())
}

/// The platform's conventional variables, mapped to their config paths.
fn platform_env_provider() -> Env {
    Env::raw().filter_map(|key| {
        let upper = key.as_str().to_ascii_uppercase();
        PLATFORM_VARS
            .iter()
            .find(|(var, _)| *var == upper)
            .map(|(_, path)| (*path).into())
    })
}
