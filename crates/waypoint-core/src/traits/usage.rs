// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage accounting sink.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::types::UsageRecord;

/// Destination for usage rows. Callers write fire-and-forget and only log
/// failures.
#[async_trait]
pub trait UsageSink: Send + Sync + 'static {
    async fn record(&self, record: UsageRecord) -> Result<(), WaypointError>;
}
