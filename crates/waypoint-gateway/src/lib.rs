// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for the Waypoint recommendation pipeline.

pub mod handlers;
pub mod rate_limit;
pub mod server;
pub mod shutdown;

pub use handlers::{ErrorResponse, HealthResponse, NDJSON, RecommendBody};
pub use rate_limit::RateLimiter;
pub use server::{GatewayState, MetricsRender, router, serve};
pub use shutdown::install_signal_handler;
