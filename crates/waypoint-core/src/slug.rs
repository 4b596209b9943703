// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! URL- and file-safe slugs.

/// Longest slug produced for storage paths and design logs.
pub const MAX_SLUG_LEN: usize = 60;

/// Lowercase ASCII alphanumerics joined by single hyphens, at most `max`
/// bytes, never starting or ending with a hyphen. Empty input yields
/// `"untitled"`.
pub fn slugify(text: &str, max: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max));
    let mut pending_hyphen = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                if slug.len() + 1 >= max {
                    break;
                }
                slug.push('-');
            }
            pending_hyphen = false;
            if slug.len() >= max {
                break;
            }
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
