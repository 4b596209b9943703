// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics that speak `waypoint.toml`.
//!
//! Every diagnostic names the `[section]` it belongs to and the
//! environment variable that overrides it, so an operator can fix the
//! file or the deployment without reading the model.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::{PLATFORM_VARS, SECTIONS};

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A dotted config path split into its `[section]` and the key inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    /// Table path, e.g. `gemini.agent_models`. Empty for top-level keys.
    pub section: String,
    pub key: String,
}

impl KeyPath {
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Split a dotted path such as `orchestrator.deadline_secs`.
    pub fn parse(dotted: &str) -> Self {
        match dotted.rsplit_once('.') {
            Some((section, key)) => Self::new(section, key),
            None => Self::new("", dotted),
        }
    }

    fn from_figment(path: &[String], key: &str) -> Self {
        Self::new(path.join("."), key)
    }

    pub fn is_top_level(&self) -> bool {
        self.section.is_empty()
    }

    fn noun(&self) -> &'static str {
        if self.is_top_level() { "section" } else { "key" }
    }

    pub fn dotted(&self) -> String {
        if self.is_top_level() {
            self.key.clone()
        } else {
            format!("{}.{}", self.section, self.key)
        }
    }

    /// The variable that overrides this key at startup.
    pub fn env_var(&self) -> String {
        let dotted = self.dotted();
        PLATFORM_VARS
            .iter()
            .find(|(_, path)| *path == dotted)
            .map(|(var, _)| (*var).to_string())
            .unwrap_or_else(|| format!("WAYPOINT_{}", dotted.replace('.', "_").to_ascii_uppercase()))
    }

    /// Where the key lives, as an operator would look for it in the file.
    pub fn location(&self) -> String {
        if self.is_top_level() {
            format!("`[{}]`", self.key)
        } else {
            format!("`{}` under `[{}]`", self.key, self.section)
        }
    }
}

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key or section was found in the configuration.
    #[error("unknown configuration {} {}", path.noun(), path.location())]
    #[diagnostic(
        code(waypoint::config::unknown_key),
        help("{}", unknown_key_help(path, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        path: KeyPath,
        suggestion: Option<String>,
        valid_keys: Vec<String>,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid value for {}: {detail}", path.location())]
    #[diagnostic(
        code(waypoint::config::invalid_type),
        help("expected {expected}; fix waypoint.toml or the {} override", path.env_var())
    )]
    InvalidType {
        path: KeyPath,
        detail: String,
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required {}", path.location())]
    #[diagnostic(code(waypoint::config::missing_key), help("{}", missing_key_help(path)))]
    MissingKey { path: KeyPath },

    /// A secret required at startup is not set.
    #[error("missing required environment variable `{var}`")]
    #[diagnostic(
        code(waypoint::config::missing_secret),
        help("export {var}=<value> or set `{path}` in waypoint.toml")
    )]
    MissingSecret { var: String, path: String },

    /// A validation error for a config value.
    #[error("validation error: {message}")]
    #[diagnostic(code(waypoint::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(waypoint::config::other))]
    Other(String),
}

impl ConfigError {
    /// A missing secret, named by its dotted config path.
    pub fn missing_secret(dotted: &str) -> Self {
        Self::MissingSecret {
            var: KeyPath::parse(dotted).env_var(),
            path: dotted.to_string(),
        }
    }
}

fn unknown_key_help(path: &KeyPath, suggestion: Option<&str>, valid_keys: &[String]) -> String {
    let (scope, guess) = if path.is_top_level() {
        (
            "waypoint.toml sections".to_string(),
            suggestion.map(|s| format!("[{s}]")),
        )
    } else {
        (
            format!("`[{}]` accepts", path.section),
            suggestion.map(str::to_string),
        )
    };
    let listing = valid_keys.join(", ");
    match guess {
        Some(g) => format!("did you mean `{g}`? {scope}: {listing}"),
        None => format!("{scope}: {listing}"),
    }
}

fn missing_key_help(path: &KeyPath) -> String {
    if path.is_top_level() {
        format!("add a `[{}]` table to your waypoint.toml", path.key)
    } else {
        format!(
            "add `{} = <value>` under `[{}]` in waypoint.toml or export {}",
            path.key,
            path.section,
            path.env_var()
        )
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// `toml_sources` pairs each config file path with its contents so unknown
/// keys can be pointed at in place.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let config_error = match &error.kind {
            Kind::UnknownField(field, expected) => {
                let path = KeyPath::from_figment(&error.path, field);
                let valid: Vec<&str> = if path.is_top_level() {
                    SECTIONS.to_vec()
                } else {
                    expected.to_vec()
                };
                let suggestion = suggest_key(field, &valid);
                let (span, src) = find_source_span(&error, &path, toml_sources);

                ConfigError::UnknownKey {
                    path,
                    suggestion,
                    valid_keys: valid.iter().map(|k| k.to_string()).collect(),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                path: KeyPath::from_figment(&error.path, field),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                path: KeyPath::parse(&error.path.join(".")),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

fn find_source_span(
    error: &figment::error::Error,
    path: &KeyPath,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline sources carry no file path; fall back to the only source given.
    let source = match source_path {
        Some(file) => toml_sources.iter().find(|(p, _)| *p == file),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    if let Some((file, content)) = source {
        if let Some(offset) = find_key_offset(content, path) {
            let span = SourceSpan::new(offset.into(), path.key.len());
            let named = NamedSource::new(file, content.to_string());
            return (Some(span), Some(named));
        }
    }

    (None, None)
}

/// Byte offset of a key in TOML content.
///
/// Top-level paths match a `[key]` table header; nested paths match
/// `key =` after the `[section]` header (dotted sections included).
pub fn find_key_offset(content: &str, path: &KeyPath) -> Option<usize> {
    if path.is_top_level() {
        let header = format!("[{}]", path.key);
        return content.find(&header).map(|pos| pos + 1);
    }

    let header = format!("[{}]", path.section);
    let body_start = content.find(&header).map(|pos| pos + header.len())?;

    let mut byte_offset = 0;
    for line in content[body_start..].lines() {
        let trimmed = line.trim_start();
        // The next table ends the search.
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(after) = trimmed.strip_prefix(path.key.as_str()) {
            if after.starts_with([' ', '=', '\t']) {
                let indent = line.len() - trimmed.len();
                return Some(body_start + byte_offset + indent);
            }
        }
        byte_offset += line.len() + 1;
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best_score = SUGGESTION_THRESHOLD;
    let mut best_match = None;

    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > best_score {
            best_score = score;
            best_match = Some(key.to_string());
        }
    }

    best_match
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
