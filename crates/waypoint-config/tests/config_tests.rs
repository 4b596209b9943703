// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Waypoint configuration system.

use figment::Jail;
use miette::Diagnostic;
use waypoint_config::diagnostic::ConfigError;
use waypoint_config::{
    KeyPath, load_and_validate_str, load_config, load_config_from_str, require_secrets,
};

/// Valid TOML with known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_waypoint_config() {
    let toml = r#"
[server]
port = 9000
rate_limit_per_minute = 30

[gemini]
generation_model = "gemini-2.0-pro"

[gemini.agent_models]
persona = "gemini-2.0-flash-lite"

[supabase]
schema = "travel"

[orchestrator]
deadline_secs = 20
media_threshold = 0.35

[ingest]
batch_size = 10
dual_write = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.rate_limit_per_minute, 30);
    assert_eq!(config.gemini.generation_model, "gemini-2.0-pro");
    assert_eq!(
        config.gemini.agent_models.get("persona").map(String::as_str),
        Some("gemini-2.0-flash-lite")
    );
    assert_eq!(config.supabase.schema, "travel");
    assert_eq!(config.orchestrator.deadline_secs, 20);
    assert_eq!(config.orchestrator.media_threshold, 0.35);
    // Untouched fields keep their defaults.
    assert_eq!(config.orchestrator.post_threshold, 0.5);
    assert_eq!(config.ingest.batch_size, 10);
    assert!(!config.ingest.dual_write);
}

/// Unknown field in a section produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[orchestrator]
dedline_secs = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    match &errors[0] {
        ConfigError::UnknownKey {
            path,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(path, &KeyPath::new("orchestrator", "dedline_secs"));
            assert_eq!(suggestion.as_deref(), Some("deadline_secs"));
            let span = span.expect("inline source is spanned");
            assert_eq!(&toml[span.offset()..span.offset() + span.len()], "dedline_secs");
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n")
        .expect_err("should reject unknown section");
    assert!(format!("{err}").contains("telegram"));
}

/// A misspelled section is matched against the section list.
#[test]
fn misspelled_section_suggests_a_section() {
    let errors = load_and_validate_str("[serch]\ntavily_api_key = \"x\"\n")
        .expect_err("should reject unknown section");
    match &errors[0] {
        ConfigError::UnknownKey {
            path, suggestion, ..
        } => {
            assert!(path.is_top_level());
            assert_eq!(suggestion.as_deref(), Some("search"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
    let help = errors[0].help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.starts_with("did you mean `[search]`?"), "{help}");
}

/// A typo in the local waypoint.toml is pointed at in that file.
#[test]
fn file_errors_point_into_the_local_file() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.create_file("waypoint.toml", "[memory]\nthresold = 0.8\n")?;

        let errors = waypoint_config::load_and_validate().expect_err("typo should fail");
        match &errors[0] {
            ConfigError::UnknownKey {
                path,
                suggestion,
                span,
                src,
                ..
            } => {
                assert_eq!(path, &KeyPath::new("memory", "thresold"));
                assert_eq!(suggestion.as_deref(), Some("threshold"));
                assert!(span.is_some());
                assert!(src.is_some());
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}

/// Wrong value type is reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n")
        .expect_err("should reject wrong type");
    match &errors[0] {
        ConfigError::InvalidType { path, .. } => {
            assert_eq!(path, &KeyPath::new("server", "port"));
            assert_eq!(path.env_var(), "WAYPOINT_SERVER_PORT");
        }
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_are_collected() {
    let toml = r#"
[orchestrator]
post_threshold = 2.0

[concurrency]
db_permits = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// `WAYPOINT_*` variables map onto sections without splitting field names.
#[test]
fn prefixed_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.create_file("waypoint.toml", "[server]\nport = 9000\n")?;
        jail.set_env("WAYPOINT_SERVER_PORT", "9100");
        jail.set_env("WAYPOINT_ORCHESTRATOR_POST_THRESHOLD", "0.65");
        jail.set_env("WAYPOINT_GEMINI_EMBEDDING_MODEL", "text-embedding-005");

        let config = load_config()?;
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.orchestrator.post_threshold, 0.65);
        assert_eq!(config.gemini.embedding_model, "text-embedding-005");
        Ok(())
    });
}

/// The platform's conventional variables feed the secret fields.
#[test]
fn platform_variables_populate_secrets() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("SUPABASE_URL", "https://proj.supabase.co");
        jail.set_env("SUPABASE_ANON_KEY", "anon-key");
        jail.set_env("GEMINI_API_KEY", "gemini-key");

        let config = load_config()?;
        let secrets = require_secrets(&config).expect("all secrets present");
        assert_eq!(secrets.supabase_url, "https://proj.supabase.co");
        assert_eq!(secrets.supabase_key, "anon-key");
        assert_eq!(secrets.gemini_api_key, "gemini-key");
        Ok(())
    });
}

/// Missing secrets are reported by variable name.
#[test]
fn missing_gemini_key_is_named() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("SUPABASE_URL", "https://proj.supabase.co");
        jail.set_env("SUPABASE_SERVICE_ROLE_KEY", "service-key");

        let config = load_config()?;
        let errors = require_secrets(&config).expect_err("gemini key missing");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("GEMINI_API_KEY"));
        Ok(())
    });
}
