use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::{summarize, TelemetrySummary};
use crate::event::TelemetryEvent;
use crate::latest::{latest_event, LatestEventView};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyPoint {
    /// Instant the call was recorded
    pub timestamp: DateTime<Utc>,
    /// Latency in milliseconds
    pub latency_ms: f64,
}

/// Aggregate latency figures over the current log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub last_ms: f64,
}

impl LatencyStats {
    /// Compute stats over an oldest-first log.
    ///
    /// # Returns
    /// `None` for an empty log
    pub fn from_events(events: &[TelemetryEvent]) -> Option<Self> {
        let last = events.last()?;
        let mut min_ms = f64::INFINITY;
        let mut max_ms = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for event in events {
            min_ms = min_ms.min(event.latency);
            max_ms = max_ms.max(event.latency);
            sum += event.latency;
        }
        Some(Self {
            count: events.len(),
            min_ms,
            max_ms,
            mean_ms: sum / events.len() as f64,
            last_ms: last.latency,
        })
    }
}

/// Chronological latency points for the line chart.
///
/// # Arguments
/// * `events` - Log in oldest-first order, as the poller stores it
pub fn latency_series(events: &[TelemetryEvent]) -> Vec<LatencyPoint> {
    events
        .iter()
        .map(|event| LatencyPoint {
            timestamp: event.timestamp,
            latency_ms: event.latency,
        })
        .collect()
}

/// Everything one dashboard render needs, derived from a single log snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub latency: Vec<LatencyPoint>,
    pub stats: Option<LatencyStats>,
    pub summary: TelemetrySummary,
    pub latest: Option<LatestEventView>,
}

impl DashboardView {
    pub fn from_events(events: &[TelemetryEvent]) -> Self {
        Self {
            latency: latency_series(events),
            stats: LatencyStats::from_events(events),
            summary: summarize(events),
            latest: latest_event(events),
        }
    }
}
