// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of HTTP statuses and transport failures onto [`WaypointError`].

use std::time::Duration;

use waypoint_core::WaypointError;
use waypoint_core::redact::redact_body;

/// Upstream bodies are truncated to this many characters in error messages.
pub const MAX_BODY_CHARS: usize = 300;

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Classify a non-success HTTP response.
///
/// The body is redacted before it enters the message. A Google
/// `API_KEY_INVALID` reason on a 400 is an authentication failure.
pub fn classify_http_status(service: &str, status: u16, body: &str) -> WaypointError {
    let message = format!("status {status}: {}", redact_body(body, MAX_BODY_CHARS));
    let service = service.to_string();
    match status {
        401 | 403 => WaypointError::Auth { service, message },
        400 if body.contains("API_KEY_INVALID") => WaypointError::Auth { service, message },
        404 => WaypointError::NotFound {
            entity: service,
            id: message,
        },
        408 => WaypointError::Timeout {
            service,
            duration: Duration::ZERO,
        },
        429 => WaypointError::RateLimited { service, message },
        500..=599 => WaypointError::Upstream {
            service,
            status: Some(status),
            message,
            source: None,
        },
        _ => WaypointError::BadRequest { service, message },
    }
}

/// Classify a transport-level failure from `reqwest`.
pub fn classify_transport(service: &str, err: reqwest::Error, timeout: Duration) -> WaypointError {
    if err.is_timeout() {
        return WaypointError::Timeout {
            service: service.to_string(),
            duration: timeout,
        };
    }
    if err.is_builder() {
        return WaypointError::bad_request(service, format!("invalid request: {err}"));
    }
    let kind = if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "response body failed"
    } else {
        "request failed"
    };
    WaypointError::Upstream {
        service: service.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: format!("{kind}: {}", waypoint_core::redact(&err.to_string())),
        source: Some(Box::new(err)),
    }
}
