use std::time::Duration;

use crate::payload::FormError;

/// Shown to the user when the service gave no readable `detail`.
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred during prediction";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("prediction service returned HTTP {status}")]
    Service { status: u16, detail: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("prediction request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed prediction response: {0}")]
    Decode(String),
}

impl PredictError {
    /// Message for the failed lifecycle state.
    pub fn user_message(&self) -> String {
        match self {
            Self::Service {
                detail: Some(detail),
                ..
            } => detail.clone(),
            _ => FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("a prediction request is already pending")]
    AlreadyPending,
    #[error(transparent)]
    Invalid(#[from] FormError),
}
