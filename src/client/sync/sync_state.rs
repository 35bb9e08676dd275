//! # Sync State
//!
//! Snapshot of the listener's view of the world, published over a watch
//! channel so a UI can render it.

use crate::client::sync::network_monitor::ConnectivityState;
use crate::client::sync::synchronizer::SyncReport;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub connectivity: ConnectivityState,
    pub is_syncing: bool,
    /// When the last pass finished
    pub last_sync: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
    /// Error that aborted the last pass, if any
    pub last_error: Option<String>,
    /// Number of passes completed since the listener started
    pub passes: u64,
}

impl SyncState {
    /// Entries the last pass left behind
    pub fn retained(&self) -> usize {
        self.last_report.as_ref().map(SyncReport::retained).unwrap_or(0)
    }
}
