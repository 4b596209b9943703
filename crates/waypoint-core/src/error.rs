// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by every Waypoint component.
//!
//! Each [`WaypointError`] variant maps to exactly one [`ErrorKind`]. The kind
//! decides the local policy: retriable kinds are retried by the resilience
//! layer, fatal kinds escape components, everything else is absorbed into a
//! component-level fallback.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Classification tag for a [`WaypointError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 401/403 or an invalid key. Fatal to the request.
    Auth,
    /// 400, schema mismatch, malformed input. Fatal to the request.
    BadRequest,
    /// 429 or quota exhaustion.
    RateLimited,
    /// Connect or read timeout.
    Timeout,
    /// 5xx, connection reset, DNS failure.
    UpstreamTransient,
    /// Model output that could not be parsed into the expected shape.
    ParseError,
    /// The requested row or object does not exist.
    NotFound,
    /// Missing or invalid configuration.
    Config,
    /// Anything else.
    Internal,
}

/// The primary error type used across all Waypoint crates.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// Configuration errors (missing secrets, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote service rejected our credentials.
    #[error("{service} rejected credentials: {message}")]
    Auth { service: String, message: String },

    /// The remote service (or a local check) rejected the request shape.
    #[error("bad request to {service}: {message}")]
    BadRequest { service: String, message: String },

    /// The remote service is shedding load.
    #[error("{service} rate limited the request: {message}")]
    RateLimited { service: String, message: String },

    /// A connect or read deadline elapsed.
    #[error("{service} timed out after {duration:?}")]
    Timeout { service: String, duration: Duration },

    /// A transient upstream failure (5xx, connection reset).
    #[error("{service} upstream error: {message}")]
    Upstream {
        service: String,
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Model output could not be turned into the expected structure.
    #[error("could not parse model output: {message}")]
    Parse { message: String },

    /// A looked-up entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WaypointError {
    /// Returns the classification tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaypointError::Config(_) => ErrorKind::Config,
            WaypointError::Auth { .. } => ErrorKind::Auth,
            WaypointError::BadRequest { .. } => ErrorKind::BadRequest,
            WaypointError::RateLimited { .. } => ErrorKind::RateLimited,
            WaypointError::Timeout { .. } => ErrorKind::Timeout,
            WaypointError::Upstream { .. } => ErrorKind::UpstreamTransient,
            WaypointError::Parse { .. } => ErrorKind::ParseError,
            WaypointError::NotFound { .. } => ErrorKind::NotFound,
            WaypointError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for failures worth another attempt after a backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::UpstreamTransient
        )
    }

    /// True for the only kinds allowed to escape a component.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Auth | ErrorKind::BadRequest)
    }

    /// Shorthand for a parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        WaypointError::Parse {
            message: message.into(),
        }
    }

    /// Shorthand for a locally detected bad request.
    pub fn bad_request(service: impl Into<String>, message: impl Into<String>) -> Self {
        WaypointError::BadRequest {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a transient upstream failure without an HTTP status.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        WaypointError::Upstream {
            service: service.into(),
            status: None,
            message: message.into(),
            source: None,
        }
    }
}
