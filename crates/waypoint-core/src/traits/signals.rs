// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioural signal store trait.

use async_trait::async_trait;

use crate::error::WaypointError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Signal;

/// Default number of signals read per request.
pub const DEFAULT_SIGNAL_LIMIT: usize = 20;

/// Read and append access to the behavioural event log.
#[async_trait]
pub trait SignalStore: PluginAdapter {
    /// Returns at most `limit` signals for the session, most recent first.
    async fn recent_signals(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Signal>, WaypointError>;

    /// Appends one signal.
    async fn append_signal(&self, signal: &Signal) -> Result<(), WaypointError>;
}
