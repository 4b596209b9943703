// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup check for the secrets the service cannot run without.

use std::fmt;

use waypoint_core::redact::REDACTED;

use crate::diagnostic::ConfigError;
use crate::model::WaypointConfig;

/// Which database key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKeyKind {
    ServiceRole,
    Anon,
}

/// Secrets resolved from configuration, all present.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub supabase_url: String,
    pub supabase_key: String,
    pub supabase_key_kind: DatabaseKeyKind,
    pub gemini_api_key: String,
    /// Optional; web scouting is disabled when absent.
    pub tavily_api_key: Option<String>,
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &REDACTED)
            .field("supabase_key_kind", &self.supabase_key_kind)
            .field("gemini_api_key", &REDACTED)
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| REDACTED))
            .finish()
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the required secrets, collecting every missing one.
///
/// The service-role key is preferred; the anon key is accepted as a fallback.
pub fn require_secrets(config: &WaypointConfig) -> Result<ResolvedSecrets, Vec<ConfigError>> {
    let mut errors = Vec::new();

    let supabase_url = present(&config.supabase.url);
    if supabase_url.is_none() {
        errors.push(ConfigError::missing_secret("supabase.url"));
    }

    let supabase_key = match (
        present(&config.supabase.service_role_key),
        present(&config.supabase.anon_key),
    ) {
        (Some(key), _) => Some((key, DatabaseKeyKind::ServiceRole)),
        (None, Some(key)) => Some((key, DatabaseKeyKind::Anon)),
        (None, None) => {
            errors.push(ConfigError::missing_secret("supabase.service_role_key"));
            None
        }
    };

    let gemini_api_key = present(&config.gemini.api_key);
    if gemini_api_key.is_none() {
        errors.push(ConfigError::missing_secret("gemini.api_key"));
    }

    match (supabase_url, supabase_key, gemini_api_key) {
        (Some(supabase_url), Some((supabase_key, supabase_key_kind)), Some(gemini_api_key))
            if errors.is_empty() =>
        {
            Ok(ResolvedSecrets {
                supabase_url: supabase_url.trim_end_matches('/').to_string(),
                supabase_key,
                supabase_key_kind,
                gemini_api_key,
                tavily_api_key: present(&config.search.tavily_api_key),
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> WaypointConfig {
        let mut config = WaypointConfig::default();
        config.supabase.url = Some("https://abc.supabase.co/".into());
        config.supabase.service_role_key = Some("service".into());
        config.supabase.anon_key = Some("anon".into());
        config.gemini.api_key = Some("gemini".into());
        config
    }

    #[test]
    fn prefers_service_role_key() {
        let secrets = require_secrets(&complete()).unwrap();
        assert_eq!(secrets.supabase_key, "service");
        assert_eq!(secrets.supabase_key_kind, DatabaseKeyKind::ServiceRole);
        assert_eq!(secrets.supabase_url, "https://abc.supabase.co");
        assert!(secrets.tavily_api_key.is_none());
    }

    #[test]
    fn falls_back_to_anon_key() {
        let mut config = complete();
        config.supabase.service_role_key = Some("   ".into());
        let secrets = require_secrets(&config).unwrap();
        assert_eq!(secrets.supabase_key, "anon");
        assert_eq!(secrets.supabase_key_kind, DatabaseKeyKind::Anon);
    }

    #[test]
    fn reports_every_missing_secret() {
        let errors = require_secrets(&WaypointConfig::default()).unwrap_err();
        let vars: Vec<String> = errors
            .iter()
            .map(|e| match e {
                ConfigError::MissingSecret { var, .. } => var.clone(),
                other => panic!("unexpected error {other}"),
            })
            .collect();
        assert_eq!(
            vars,
            vec!["SUPABASE_URL", "SUPABASE_SERVICE_ROLE_KEY", "GEMINI_API_KEY"]
        );
    }

    #[test]
    fn debug_hides_keys() {
        let secrets = require_secrets(&complete()).unwrap();
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("service\""));
        assert!(!debug.contains("gemini\""));
    }
}
