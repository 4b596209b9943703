// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window request limiting per remote address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::debug;

use crate::handlers::ErrorResponse;

/// Window length.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Expired windows are swept once this many addresses are tracked.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per address within a fixed one-minute window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_window(limit_per_minute, WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request. `Err` carries the time until the window resets.
    pub fn check(&self, addr: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.windows.len() > SWEEP_THRESHOLD {
            self.windows
                .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        }

        let mut entry = self.windows.entry(addr).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            return Err(self.window.saturating_sub(now.saturating_duration_since(entry.started)));
        }
        entry.count += 1;
        Ok(())
    }
}

/// Remote address of a request, or unspecified when the server was not
/// started with connection info.
pub fn client_addr(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Axum middleware enforcing the limiter.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let addr = client_addr(&request);
    match limiter.check(addr, Instant::now()) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let secs = retry_after.as_secs().max(1);
            debug!(%addr, retry_after_secs = secs, "rate limited");
            metrics::counter!("waypoint_rate_limited_total").increment(1);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new(format!(
                    "rate limit of {} requests per minute exceeded",
                    limiter.limit()
                ))),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
