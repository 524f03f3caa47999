use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::TelemetryEvent;

pub const SUCCESS_STATUS: &str = "success";
pub const HTTP_OK_STATUS: &str = "200";

/// Card-level success test. Narrower than the classifier's fault buckets:
/// a `"404"` is nominal there but not ok here.
pub fn is_ok_status(status: &str) -> bool {
    status == SUCCESS_STATUS || status == HTTP_OK_STATUS
}

/// Presentation fields for the most recent event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestEventView {
    pub status: String,
    pub ok: bool,
    /// Milliseconds, two decimals.
    pub latency: String,
    pub time: String,
    pub timestamp: DateTime<Utc>,
}

impl LatestEventView {
    pub fn from_event(event: &TelemetryEvent) -> Self {
        Self {
            status: event.status.clone(),
            ok: is_ok_status(&event.status),
            latency: format!("{:.2}", event.latency),
            time: event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            timestamp: event.timestamp,
        }
    }
}

/// View of the last event of an oldest-first log.
pub fn latest_event(events: &[TelemetryEvent]) -> Option<LatestEventView> {
    events.last().map(LatestEventView::from_event)
}
