// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handles POST /recommend, POST /recommend/stream, GET /health and
//! GET /metrics.

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use waypoint_agent::{RecommendRequest, StreamEvent};
use waypoint_core::Recommendation;

use crate::server::GatewayState;

/// Content type of the streaming endpoint.
pub const NDJSON: &str = "application/x-ndjson";

/// Request body for both recommendation endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendBody {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl RecommendBody {
    /// Reject blank identifiers before any work starts.
    pub fn into_request(self) -> Result<RecommendRequest, ErrorResponse> {
        let session_id = self.session_id.trim();
        let query = self.query.trim();
        if session_id.is_empty() {
            return Err(ErrorResponse::new("session_id must not be empty"));
        }
        if query.is_empty() {
            return Err(ErrorResponse::new("query must not be empty"));
        }
        let mut request = RecommendRequest::new(session_id, query);
        if let Some(user) = self.user_id.filter(|u| !u.trim().is_empty()) {
            request = request.with_user(user);
        }
        Ok(request)
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub version: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

fn bad_request(error: ErrorResponse) -> Response {
    (StatusCode::BAD_REQUEST, Json(error)).into_response()
}

/// POST /recommend
///
/// Every orchestrator outcome is a 200, fallbacks included.
pub async fn post_recommend(
    State(state): State<GatewayState>,
    Json(body): Json<RecommendBody>,
) -> Response {
    let request = match body.into_request() {
        Ok(request) => request,
        Err(error) => return bad_request(error),
    };
    let outcome = state.orchestrator.recommend(request).await;
    Json::<Recommendation>(outcome.recommendation).into_response()
}

/// One NDJSON line for an event.
pub fn ndjson_line(event: &StreamEvent) -> Option<Bytes> {
    match serde_json::to_vec(event) {
        Ok(mut line) => {
            line.push(b'\n');
            Some(Bytes::from(line))
        }
        Err(e) => {
            warn!(error = %e, "dropping unserialisable stream event");
            None
        }
    }
}

/// POST /recommend/stream
///
/// Runs the orchestrator in a task feeding a bounded channel; the body reads
/// from the channel, so a slow client back-pressures the run and a dropped
/// connection cancels it.
pub async fn post_recommend_stream(
    State(state): State<GatewayState>,
    Json(body): Json<RecommendBody>,
) -> Response {
    let request = match body.into_request() {
        Ok(request) => request,
        Err(error) => return bad_request(error),
    };

    let (tx, rx) = mpsc::channel(state.stream_buffer.max(1));
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let session_id = request.session_id.clone();
        let outcome = orchestrator.recommend_stream(request, tx).await;
        debug!(
            session_id = %session_id,
            outcome = outcome.trace.outcome(),
            cancelled = outcome.trace.cancelled,
            "stream finished"
        );
    });

    let lines = stream::unfold(rx, |mut rx| async move {
        loop {
            let event = rx.recv().await?;
            if let Some(line) = ndjson_line(&event) {
                return Some((Ok::<_, Infallible>(line), rx));
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(lines))
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build stream response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics
///
/// Prometheus text format; 404 when no recorder was installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("metrics recorder not installed")),
        )
            .into_response(),
    }
}
