// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Waypoint.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, required-secret
//! checks, and miette diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use waypoint_config::{load_and_validate, require_secrets};
//!
//! let config = load_and_validate().expect("config errors");
//! let secrets = require_secrets(&config).expect("missing secrets");
//! println!("Database: {}", secrets.supabase_url);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod secrets;
pub mod validation;

pub use diagnostic::{ConfigError, KeyPath, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::WaypointConfig;
pub use secrets::{DatabaseKeyKind, ResolvedSecrets, require_secrets};
pub use validation::validate_config;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Parse failures are pointed at the `waypoint.toml` that caused them.
pub fn load_and_validate() -> Result<WaypointConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        loader::read_config_sources(&loader::config_files())
    })
}

/// Load configuration from a specific TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<WaypointConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("waypoint.toml".to_string(), toml_content.to_string())]
    })
}

/// Validate a parsed config, or explain the parse failure against `sources`.
fn finish(
    parsed: Result<WaypointConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<WaypointConfig, Vec<ConfigError>> {
    match parsed {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}
