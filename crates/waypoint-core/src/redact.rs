// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction for upstream error bodies and log output.
//!
//! Supabase and Gemini both echo request material back in error bodies, so
//! anything that reaches a [`crate::WaypointError`] message or a log line
//! passes through [`redact`] first.

use std::sync::LazyLock;

use regex::Regex;

/// Known secret patterns to redact from output.
static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Google API keys: AIza...
        Regex::new(r"AIza[0-9A-Za-z_\-]{30,}").unwrap(),
        // JWT-shaped strings (Supabase service-role and anon keys).
        Regex::new(r"eyJ[a-zA-Z0-9_\-]{8,}\.[a-zA-Z0-9_\-]{8,}\.[a-zA-Z0-9_\-]{8,}").unwrap(),
        // Bearer tokens in headers
        Regex::new(r"Bearer\s+[a-zA-Z0-9._\-]{10,}").unwrap(),
        // Tavily keys: tvly-...
        Regex::new(r"tvly-[a-zA-Z0-9_\-]{16,}").unwrap(),
        // Key material passed as a query parameter.
        Regex::new(r"(?i)(key|apikey|api_key)=[^&\s]{8,}").unwrap(),
    ]
});

/// The redaction placeholder.
pub const REDACTED: &str = "[REDACTED]";

/// Redact secrets from a string.
pub fn redact(input: &str) -> String {
    let mut result = input.to_string();
    for pattern in REDACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).to_string();
    }
    result
}

/// Redact and cap an upstream body so error messages stay readable.
pub fn redact_body(body: &str, max_chars: usize) -> String {
    let redacted = redact(body.trim());
    if redacted.chars().count() <= max_chars {
        return redacted;
    }
    let mut capped: String = redacted.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}
