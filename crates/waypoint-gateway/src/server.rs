// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use waypoint_agent::Orchestrator;
use waypoint_config::model::ServerConfig;
use waypoint_core::WaypointError;

use crate::handlers;
use crate::rate_limit::{RateLimiter, rate_limit_middleware};

/// Renders the installed metrics recorder as Prometheus text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub limiter: Arc<RateLimiter>,
    /// Bounded event buffer per streaming request.
    pub stream_buffer: usize,
    pub prometheus_render: Option<MetricsRender>,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &ServerConfig) -> Self {
        Self {
            orchestrator,
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_minute)),
            stream_buffer: config.stream_buffer,
            prometheus_render: None,
        }
    }

    pub fn with_metrics(mut self, render: MetricsRender) -> Self {
        self.prometheus_render = Some(render);
        self
    }
}

/// Build the router.
///
/// - POST /recommend, POST /recommend/stream (rate limited)
/// - GET /health, GET /metrics
pub fn router(state: GatewayState) -> Router {
    let limited = Router::new()
        .route("/recommend", post(handlers::post_recommend))
        .route("/recommend/stream", post(handlers::post_recommend_stream))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state);

    Router::new()
        .merge(limited)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), WaypointError> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WaypointError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(
        %addr,
        rate_limit_per_minute = config.rate_limit_per_minute,
        "gateway listening"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| WaypointError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
