//! Telemetry sink
//!
//! Analytics events and error reports are fire-and-forget: implementations
//! must not block and cannot fail the caller.

use crate::client::error::SyncError;
use serde_json::Value;

/// Destination for analytics events and error reports
pub trait Telemetry: Send + Sync {
    /// Record a named event such as `team_created`
    fn track(&self, event: &str, properties: &Value);

    /// Record a failure together with where it happened
    fn record_error(&self, context: &str, error: &SyncError);
}

/// Forwards telemetry to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn track(&self, event: &str, properties: &Value) {
        tracing::info!(target: "tasksync::telemetry", "{} {}", event, properties);
    }

    fn record_error(&self, context: &str, error: &SyncError) {
        tracing::error!(target: "tasksync::telemetry", "{}: {}", context, error);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn track(&self, _event: &str, _properties: &Value) {}

    fn record_error(&self, _context: &str, _error: &SyncError) {}
}
