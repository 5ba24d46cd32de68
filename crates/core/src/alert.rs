//! Alert delivery for leaked streams

use parking_lot::Mutex;

/// Default alert name raised when a stream is reclaimed without being closed
pub const UNCLOSED_STREAM_ALERT: &str = "UNCLOSED_STREAM";

/// Sink for leak alerts
///
/// Invoked exactly once per detected leak, never for a stream that was
/// closed through the normal path.
pub trait AlertSink: Send + Sync {
    /// Raise an alert for the given location description
    fn trigger_alert(&self, alert_name: &str, location: &str);
}

/// Alert sink that emits a `tracing` warning
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn trigger_alert(&self, alert_name: &str, location: &str) {
        tracing::warn!(
            alert = alert_name,
            location = location,
            "stream from {} was reclaimed without being consumed or closed",
            location
        );
    }
}

/// An alert captured by [`RecordingAlertSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Alert name
    pub name: String,
    /// Location description the alert was raised for
    pub location: String,
}

/// Alert sink that keeps every alert in memory
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts raised so far, in order
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Number of alerts raised so far
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alert was raised
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

impl AlertSink for RecordingAlertSink {
    fn trigger_alert(&self, alert_name: &str, location: &str) {
        self.alerts.lock().push(Alert {
            name: alert_name.to_string(),
            location: location.to_string(),
        });
    }
}
