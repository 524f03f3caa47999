//! Telemetry aggregation for the service health dashboard.
//!
//! A [`TelemetryPoller`] keeps the latest metrics window from the service.
//! Each published [`TelemetrySnapshot`] can be classified into outcome
//! buckets, reduced to its most recent event, or turned into a latency
//! series for charting.

pub mod classifier;
pub mod event;
pub mod latest;
pub mod poller;
pub mod series;
pub mod source;

pub use classifier::{classify_status, summarize, StatusBucket, TelemetrySummary};
pub use event::{parse_timestamp, TelemetryEvent};
pub use latest::{is_ok_status, latest_event, LatestEventView};
pub use poller::{PollerConfig, PollerState, TelemetryPoller, TelemetrySnapshot, DEFAULT_POLL_INTERVAL};
pub use series::{latency_series, DashboardView, LatencyPoint, LatencyStats};
pub use source::{EndpointError, FetchError, HttpMetricsSource, MetricsSource};
