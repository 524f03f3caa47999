//! Prediction request pipeline for the clinical risk service.
//!
//! Raw form state is coerced by [`payload::encode`], submitted through a
//! [`PredictionClient`], and the returned distribution is turned into a
//! display-ready [`RiskProjection`] by [`risk::project`].

pub mod client;
pub mod error;
pub mod payload;
pub mod risk;
pub mod transport;
pub mod types;

pub use client::{LifecycleState, PredictionClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{PredictError, SubmitError, FALLBACK_ERROR_MESSAGE};
pub use payload::{encode, Diagnosis, Field, FieldIssue, FormError, PatientObservation, RawForm, Sex};
pub use risk::{format_probability, project, RiskCategory, RiskProjection};
pub use transport::{endpoint, EndpointError, HttpPredictionTransport, PredictionTransport};
pub use types::{PredictionOutcome, Probabilities, ProbabilityError, RiskLabel};
