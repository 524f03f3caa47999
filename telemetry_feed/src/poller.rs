//! Recurring metrics fetch that owns the telemetry log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::classifier::{summarize, TelemetrySummary};
use crate::event::TelemetryEvent;
use crate::latest::{latest_event, LatestEventView};
use crate::series::DashboardView;
use crate::source::{FetchError, MetricsSource};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between fetch starts
    pub interval: Duration,
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running,
}

/// Immutable view of the telemetry log plus poll bookkeeping.
///
/// `events` is oldest-first and shared; a successful poll swaps in a new
/// slice, a failed one keeps the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub events: Arc<[TelemetryEvent]>,
    pub updated_at: Option<DateTime<Utc>>,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            events: Arc::from(Vec::new()),
            updated_at: None,
            successes: 0,
            failures: 0,
            last_error: None,
        }
    }
}

impl TelemetrySnapshot {
    pub fn summary(&self) -> TelemetrySummary {
        summarize(&self.events)
    }

    pub fn latest(&self) -> Option<LatestEventView> {
        latest_event(&self.events)
    }

    pub fn dashboard(&self) -> DashboardView {
        DashboardView::from_events(&self.events)
    }
}

struct Shared<S> {
    source: S,
    config: PollerConfig,
    log: watch::Sender<TelemetrySnapshot>,
    // Bumped on every start and stop; a fetch only applies if the value it
    // started under is still current.
    generation: Mutex<u64>,
}

impl<S: MetricsSource> Shared<S> {
    async fn run(&self, generation: u64) {
        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // First tick completes immediately.
            ticker.tick().await;
            self.poll_once(generation).await;
        }
    }

    async fn poll_once(&self, generation: u64) {
        let timeout = self.config.fetch_timeout;
        let fetched = match tokio::time::timeout(timeout, self.source.fetch_metrics()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };
        self.apply(generation, fetched);
    }

    fn apply(&self, generation: u64, fetched: Result<Vec<TelemetryEvent>, FetchError>) {
        let current = self.generation.lock();
        if *current != generation {
            debug!(generation, current = *current, "discarding stale metrics fetch");
            return;
        }
        match fetched {
            Ok(mut events) => {
                events.reverse();
                let count = events.len();
                self.log.send_modify(|snapshot| {
                    snapshot.events = Arc::from(events);
                    snapshot.updated_at = Some(Utc::now());
                    snapshot.successes += 1;
                    snapshot.last_error = None;
                });
                debug!(events = count, "telemetry log replaced");
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch metrics");
                self.log.send_modify(|snapshot| {
                    snapshot.failures += 1;
                    snapshot.last_error = Some(err.to_string());
                });
            }
        }
    }
}

/// Polls a [`MetricsSource`] on a fixed period and publishes each result as
/// a [`TelemetrySnapshot`].
///
/// Dropping the poller stops it.
pub struct TelemetryPoller<S> {
    shared: Arc<Shared<S>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: MetricsSource + 'static> TelemetryPoller<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, PollerConfig::default())
    }

    pub fn with_config(source: S, config: PollerConfig) -> Self {
        let (log, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            shared: Arc::new(Shared {
                source,
                config,
                log,
                generation: Mutex::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Fetch now and then every interval. No-op while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let generation = {
            let mut current = self.shared.generation.lock();
            *current += 1;
            *current
        };
        info!(
            interval = ?self.shared.config.interval,
            generation,
            "starting telemetry poller"
        );
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move { shared.run(generation).await }));
    }
}

impl<S> TelemetryPoller<S> {
    /// Cancel the schedule. A fetch already in flight is dropped and its
    /// result, should it still arrive, is never applied.
    pub fn stop(&self) {
        let Some(handle) = self.task.lock().take() else {
            return;
        };
        *self.shared.generation.lock() += 1;
        handle.abort();
        info!("telemetry poller stopped");
    }

    pub fn state(&self) -> PollerState {
        match self.task.lock().as_ref() {
            Some(handle) if !handle.is_finished() => PollerState::Running,
            _ => PollerState::Stopped,
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.shared.log.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.shared.log.subscribe()
    }

    pub fn config(&self) -> PollerConfig {
        self.shared.config
    }
}

impl<S> Drop for TelemetryPoller<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            *self.shared.generation.lock() += 1;
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct NeverCalled;

    impl MetricsSource for NeverCalled {
        fn fetch_metrics(&self) -> BoxFuture<'_, Result<Vec<TelemetryEvent>, FetchError>> {
            futures::future::pending().boxed()
        }
    }

    fn shared() -> Shared<NeverCalled> {
        let (log, _) = watch::channel(TelemetrySnapshot::default());
        Shared {
            source: NeverCalled,
            config: PollerConfig::default(),
            log,
            generation: Mutex::new(1),
        }
    }

    fn event(secs: i64) -> TelemetryEvent {
        TelemetryEvent::new(Utc.timestamp_opt(secs, 0).unwrap(), "success", 1.0)
    }

    #[test]
    fn apply_reverses_into_oldest_first() {
        let shared = shared();
        shared.apply(1, Ok(vec![event(3), event(2), event(1)]));
        let snapshot = shared.log.borrow().clone();
        assert_eq!(&*snapshot.events, &[event(1), event(2), event(3)]);
        assert_eq!(snapshot.successes, 1);
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn stale_generation_is_discarded() {
        let shared = shared();
        shared.apply(1, Ok(vec![event(1)]));
        *shared.generation.lock() += 1;
        shared.apply(1, Ok(vec![event(9), event(8)]));
        shared.apply(1, Err(FetchError::Status(500)));
        let snapshot = shared.log.borrow().clone();
        assert_eq!(&*snapshot.events, &[event(1)]);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 0);
    }

    #[test]
    fn failure_keeps_the_same_log_allocation() {
        let shared = shared();
        shared.apply(1, Ok(vec![event(2), event(1)]));
        let before = shared.log.borrow().events.clone();
        shared.apply(1, Err(FetchError::Transport("connection refused".into())));
        let after = shared.log.borrow().clone();
        assert!(Arc::ptr_eq(&before, &after.events));
        assert_eq!(after.failures, 1);
        assert_eq!(
            after.last_error.as_deref(),
            Some("transport error: connection refused")
        );
    }

    #[test]
    fn success_clears_last_error() {
        let shared = shared();
        shared.apply(1, Err(FetchError::Status(503)));
        shared.apply(1, Ok(Vec::new()));
        let snapshot = shared.log.borrow().clone();
        assert_eq!(snapshot.last_error, None);
        assert!(snapshot.events.is_empty());
    }

    #[tokio::test]
    async fn new_poller_is_stopped_and_empty() {
        let poller = TelemetryPoller::new(NeverCalled);
        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(poller.snapshot().events.is_empty());
        poller.stop();
        assert_eq!(poller.state(), PollerState::Stopped);
    }
}
