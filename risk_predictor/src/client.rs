//! Submission lifecycle for one prediction form.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{PredictError, SubmitError, FALLBACK_ERROR_MESSAGE};
use crate::payload::{self, PatientObservation, RawForm};
use crate::transport::PredictionTransport;
use crate::types::PredictionOutcome;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Pending,
    Succeeded(PredictionOutcome),
    Failed(String),
}

impl LifecycleState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn outcome(&self) -> Option<&PredictionOutcome> {
        match self {
            Self::Succeeded(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Owns the lifecycle of prediction requests issued from one form.
///
/// At most one request is pending at a time. Observers read the state with
/// [`PredictionClient::state`] or follow it through
/// [`PredictionClient::subscribe`].
pub struct PredictionClient<T> {
    transport: T,
    timeout: Duration,
    state: watch::Sender<LifecycleState>,
}

impl<T: PredictionTransport> PredictionClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(transport: T, timeout: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            transport,
            timeout,
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Return a finished request to idle. Pending requests are left alone.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                *state = LifecycleState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Validate the raw form, then submit it. An invalid form never
    /// reaches the transport and leaves the lifecycle untouched.
    pub async fn submit_form(&self, form: &RawForm) -> Result<LifecycleState, SubmitError> {
        let observation = payload::encode(form)?;
        self.submit(&observation).await
    }

    /// Issue one prediction request and drive the lifecycle to a terminal
    /// state. Refused with [`SubmitError::AlreadyPending`] while another
    /// request is in flight.
    pub async fn submit(
        &self,
        observation: &PatientObservation,
    ) -> Result<LifecycleState, SubmitError> {
        let guard = self.begin()?;
        debug!(?observation, "submitting prediction request");

        let result = match tokio::time::timeout(self.timeout, self.transport.predict(observation)).await {
            Ok(result) => result,
            Err(_) => Err(PredictError::Timeout(self.timeout)),
        };

        let next = match result {
            Ok(outcome) => {
                info!(
                    prediction = ?outcome.prediction,
                    p_high = outcome.probas.high(),
                    "prediction succeeded"
                );
                LifecycleState::Succeeded(outcome)
            }
            Err(err) => {
                warn!(error = %err, "prediction failed");
                LifecycleState::Failed(err.user_message())
            }
        };
        guard.complete(next.clone());
        Ok(next)
    }

    fn begin(&self) -> Result<PendingGuard<'_>, SubmitError> {
        // Check and claim under the channel lock so two callers cannot both
        // observe a non-pending state.
        let claimed = self.state.send_if_modified(|state| {
            if state.is_pending() {
                false
            } else {
                *state = LifecycleState::Pending;
                true
            }
        });
        if !claimed {
            return Err(SubmitError::AlreadyPending);
        }
        Ok(PendingGuard {
            state: &self.state,
            completed: false,
        })
    }
}

/// Moves the lifecycle out of `Pending` even if the submit future is dropped.
struct PendingGuard<'a> {
    state: &'a watch::Sender<LifecycleState>,
    completed: bool,
}

impl PendingGuard<'_> {
    fn complete(mut self, next: LifecycleState) {
        self.state.send_replace(next);
        self.completed = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!("prediction request abandoned before completion");
            self.state
                .send_replace(LifecycleState::Failed(FALLBACK_ERROR_MESSAGE.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Diagnosis, Sex};
    use crate::types::{Probabilities, RiskLabel};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn observation() -> PatientObservation {
        PatientObservation {
            age: 65,
            sex: Sex::Female,
            bmi: 28.5,
            systolic_bp: 140,
            diastolic_bp: 90,
            glucose: 110.0,
            cholesterol: 200.0,
            creatinine: 1.2,
            diabetes: true,
            hypertension: false,
            diagnosis: Diagnosis::Sepsis,
            readmission_30d: false,
        }
    }

    fn high_risk() -> PredictionOutcome {
        PredictionOutcome {
            prediction: RiskLabel::High,
            probas: Probabilities::new(0.27, 0.73).unwrap(),
        }
    }

    /// Replies with a fixed result, optionally after `gate` is notified.
    struct FakeTransport {
        reply: Result<PredictionOutcome, PredictError>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn replying(reply: Result<PredictionOutcome, PredictError>) -> Self {
            Self {
                reply,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(reply: Result<PredictionOutcome, PredictError>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::replying(reply)
            }
        }
    }

    impl PredictionTransport for FakeTransport {
        fn predict<'a>(
            &'a self,
            _observation: &'a PatientObservation,
        ) -> BoxFuture<'a, Result<PredictionOutcome, PredictError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                self.reply.clone()
            }
            .boxed()
        }
    }

    struct HangingTransport;

    impl PredictionTransport for HangingTransport {
        fn predict<'a>(
            &'a self,
            _observation: &'a PatientObservation,
        ) -> BoxFuture<'a, Result<PredictionOutcome, PredictError>> {
            futures::future::pending().boxed()
        }
    }

    #[tokio::test]
    async fn starts_idle() {
        let client = PredictionClient::new(FakeTransport::replying(Ok(high_risk())));
        assert_eq!(client.state(), LifecycleState::Idle);
        assert!(!client.is_pending());
    }

    #[tokio::test]
    async fn success_moves_to_succeeded() {
        let client = PredictionClient::new(FakeTransport::replying(Ok(high_risk())));
        let state = client.submit(&observation()).await.unwrap();
        assert_eq!(state, LifecycleState::Succeeded(high_risk()));
        assert_eq!(client.state(), state);
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_detail_becomes_failure_message() {
        let client = PredictionClient::new(FakeTransport::replying(Err(PredictError::Service {
            status: 500,
            detail: Some("Error calling Dataiku API: boom".into()),
        })));
        let state = client.submit(&observation()).await.unwrap();
        assert_eq!(state.error(), Some("Error calling Dataiku API: boom"));
    }

    #[tokio::test]
    async fn transport_failure_uses_fallback_message() {
        let client = PredictionClient::new(FakeTransport::replying(Err(PredictError::Transport(
            "connection refused".into(),
        ))));
        let state = client.submit(&observation()).await.unwrap();
        assert_eq!(state, LifecycleState::Failed(FALLBACK_ERROR_MESSAGE.into()));
    }

    #[tokio::test]
    async fn every_reply_kind_ends_terminal() {
        let replies = [
            Ok(high_risk()),
            Err(PredictError::Transport("reset".into())),
            Err(PredictError::Decode("eof".into())),
            Err(PredictError::Service {
                status: 422,
                detail: None,
            }),
        ];
        for reply in replies {
            let client = PredictionClient::new(FakeTransport::replying(reply));
            let state = client.submit(&observation()).await.unwrap();
            assert!(state.is_terminal(), "ended in {state:?}");
            assert!(!client.is_pending());
        }
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_refused() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(PredictionClient::new(FakeTransport::gated(
            Ok(high_risk()),
            Arc::clone(&gate),
        )));

        let mut states = client.subscribe();
        let first = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.submit(&observation()).await }
        });
        states.wait_for(LifecycleState::is_pending).await.unwrap();

        let refused = client.submit(&observation()).await;
        assert!(matches!(refused, Err(SubmitError::AlreadyPending)));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let state = first.await.unwrap().unwrap();
        assert_eq!(state, LifecycleState::Succeeded(high_risk()));
    }

    #[tokio::test]
    async fn new_submission_clears_previous_result() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(PredictionClient::new(FakeTransport::gated(
            Err(PredictError::Transport("down".into())),
            Arc::clone(&gate),
        )));
        gate.notify_one();
        client.submit(&observation()).await.unwrap();
        assert!(client.state().error().is_some());

        let mut states = client.subscribe();
        let retry = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.submit(&observation()).await }
        });
        states.wait_for(LifecycleState::is_pending).await.unwrap();
        assert_eq!(client.state(), LifecycleState::Pending);
        gate.notify_one();
        retry.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out_into_failed() {
        let client = PredictionClient::with_timeout(HangingTransport, Duration::from_secs(5));
        let state = client.submit(&observation()).await.unwrap();
        assert_eq!(state, LifecycleState::Failed(FALLBACK_ERROR_MESSAGE.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_submit_does_not_leave_pending() {
        let client = PredictionClient::with_timeout(HangingTransport, Duration::from_secs(60));
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), client.submit(&observation())).await;
        assert!(abandoned.is_err());
        assert_eq!(
            client.state(),
            LifecycleState::Failed(FALLBACK_ERROR_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn invalid_form_is_blocked_before_transport() {
        let client = PredictionClient::new(FakeTransport::replying(Ok(high_risk())));
        let err = client.submit_form(&RawForm::default()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(_)));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn reset_returns_terminal_state_to_idle() {
        let client = PredictionClient::new(FakeTransport::replying(Ok(high_risk())));
        client.submit(&observation()).await.unwrap();
        client.reset();
        assert_eq!(client.state(), LifecycleState::Idle);
    }
}
