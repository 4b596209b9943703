// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff with jitter, shared by every outbound call.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};
use waypoint_config::model::RetryConfig;
use waypoint_core::WaypointError;

use crate::deadline::Deadline;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            jitter_min: config.jitter_min,
            jitter_max: config.jitter_max,
        }
    }

    /// A policy that tries once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Same policy without randomness, for deterministic tests.
    pub fn without_jitter(mut self) -> Self {
        self.jitter_min = 1.0;
        self.jitter_max = 1.0;
        self
    }

    /// Delay before retry number `retry` (1-based), jitter factor applied.
    pub fn delay_for(&self, retry: u32, jitter: f64) -> Duration {
        let exp = self.multiplier.powi(retry.saturating_sub(1) as i32);
        self.base_delay.mul_f64((exp * jitter).max(0.0))
    }

    fn jitter(&self) -> f64 {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        rand::thread_rng().gen_range(self.jitter_min..=self.jitter_max)
    }

    /// Run `op` until it succeeds, fails with a non-retriable error, runs out
    /// of attempts, or the next backoff would overrun `deadline`.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        service: &str,
        deadline: Option<&Deadline>,
        mut op: F,
    ) -> Result<T, WaypointError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, WaypointError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retriable() {
                debug!(service, attempt, kind = %err.kind(), "non-retriable failure");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                warn!(service, attempt, kind = %err.kind(), "retries exhausted");
                return Err(err);
            }

            let delay = self.delay_for(attempt, self.jitter());
            if let Some(deadline) = deadline {
                if deadline.remaining() <= delay {
                    warn!(
                        service,
                        attempt,
                        remaining_ms = deadline.remaining().as_millis() as u64,
                        "backoff would overrun the deadline, giving up"
                    );
                    return Err(err);
                }
            }

            warn!(
                service,
                attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %err.kind(),
                error = %err,
                "transient failure, will retry"
            );
            metrics::counter!("waypoint_retries_total", "service" => service.to_string())
                .increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
