// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fitting single attempts inside a request [`Deadline`].

use std::future::Future;
use std::time::Duration;

use waypoint_core::WaypointError;

pub use waypoint_core::Deadline;

fn expired(service: &str, deadline: &Deadline) -> WaypointError {
    WaypointError::Timeout {
        service: service.to_string(),
        duration: deadline.budget(),
    }
}

/// Read timeout for one attempt: `configured`, cut to what `deadline` leaves.
///
/// Fails with a `timeout` error once the deadline has passed.
pub fn attempt_timeout(
    service: &str,
    configured: Duration,
    deadline: Option<&Deadline>,
) -> Result<Duration, WaypointError> {
    match deadline {
        None => Ok(configured),
        Some(deadline) if deadline.is_expired() => Err(expired(service, deadline)),
        Some(deadline) => Ok(configured.min(deadline.remaining())),
    }
}

/// Awaits `fut`, failing with a `timeout` error when `deadline` passes first.
///
/// Covers time spent waiting for a gate permit, which a transport read
/// timeout does not.
pub async fn bounded<T, F>(
    service: &str,
    deadline: Option<&Deadline>,
    fut: F,
) -> Result<T, WaypointError>
where
    F: Future<Output = Result<T, WaypointError>>,
{
    let Some(deadline) = deadline else {
        return fut.await;
    };
    match tokio::time::timeout_at(deadline.instant(), fut).await {
        Ok(result) => result,
        Err(_) => Err(expired(service, deadline)),
    }
}
