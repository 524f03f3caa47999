use serde::Serialize;

use crate::event::TelemetryEvent;

pub const API_ERROR_STATUS: &str = "API Error";
pub const INTERNAL_ERROR_STATUS: &str = "Internal Server Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusBucket {
    Nominal,
    InternalFault,
    ApiFault,
}

impl StatusBucket {
    pub fn label(self) -> &'static str {
        match self {
            Self::Nominal => "Good Requests",
            Self::InternalFault => "Internal Server Errors",
            Self::ApiFault => "API Errors",
        }
    }
}

/// Exact match against the two fault labels; anything else is nominal.
pub fn classify_status(status: &str) -> StatusBucket {
    match status {
        API_ERROR_STATUS => StatusBucket::ApiFault,
        INTERNAL_ERROR_STATUS => StatusBucket::InternalFault,
        _ => StatusBucket::Nominal,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySummary {
    pub nominal: usize,
    pub internal_fault: usize,
    pub api_fault: usize,
}

impl TelemetrySummary {
    pub fn total(&self) -> usize {
        self.nominal + self.internal_fault + self.api_fault
    }

    pub fn count(&self, bucket: StatusBucket) -> usize {
        match bucket {
            StatusBucket::Nominal => self.nominal,
            StatusBucket::InternalFault => self.internal_fault,
            StatusBucket::ApiFault => self.api_fault,
        }
    }

    /// Bar chart rows: good, internal, api.
    pub fn rows(&self) -> [(StatusBucket, usize); 3] {
        [
            StatusBucket::Nominal,
            StatusBucket::InternalFault,
            StatusBucket::ApiFault,
        ]
        .map(|bucket| (bucket, self.count(bucket)))
    }
}

pub fn summarize(events: &[TelemetryEvent]) -> TelemetrySummary {
    let mut internal_fault = 0;
    let mut api_fault = 0;
    for event in events {
        match classify_status(&event.status) {
            StatusBucket::InternalFault => internal_fault += 1,
            StatusBucket::ApiFault => api_fault += 1,
            StatusBucket::Nominal => {}
        }
    }
    TelemetrySummary {
        nominal: events.len() - internal_fault - api_fault,
        internal_fault,
        api_fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn log(statuses: &[&str]) -> Vec<TelemetryEvent> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                TelemetryEvent::new(
                    Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                    *status,
                    10.0,
                )
            })
            .collect()
    }

    #[test]
    fn partitions_mixed_log() {
        let summary = summarize(&log(&["success", "API Error", "Internal Server Error", "200"]));
        assert_eq!(
            summary,
            TelemetrySummary {
                nominal: 2,
                internal_fault: 1,
                api_fault: 1
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn empty_log_is_all_zero() {
        assert_eq!(summarize(&[]), TelemetrySummary::default());
    }

    #[test]
    fn unknown_statuses_count_as_nominal() {
        let summary = summarize(&log(&["404", "timeout", "api error", "Internal server error"]));
        assert_eq!(summary.nominal, 4);
        assert_eq!(summary.api_fault + summary.internal_fault, 0);
    }

    #[test]
    fn rows_are_in_chart_order() {
        let summary = summarize(&log(&["API Error", "API Error", "success"]));
        let rows: Vec<(&str, usize)> = summary
            .rows()
            .iter()
            .map(|(bucket, n)| (bucket.label(), *n))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Good Requests", 1),
                ("Internal Server Errors", 0),
                ("API Errors", 2)
            ]
        );
    }
}
