use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Allowed drift of `p("0") + p("1")` away from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-4;

/// Binary label as the service returns it: `"0"` low risk, `"1"` high risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "0")]
    Low,
    #[serde(rename = "1")]
    High,
}

impl RiskLabel {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Low => "Low risk",
            Self::High => "High risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbabilityError {
    #[error("missing probability for label {0:?}")]
    MissingLabel(&'static str),
    #[error("probability for label {label:?} is outside [0, 1]: {value}")]
    OutOfRange { label: &'static str, value: f64 },
    #[error("probabilities sum to {0}, expected 1.0")]
    BadSum(f64),
}

/// Probability distribution over the two labels, checked to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Probabilities {
    low: f64,
    high: f64,
}

impl Probabilities {
    pub fn new(low: f64, high: f64) -> Result<Self, ProbabilityError> {
        for (label, value) in [("0", low), ("1", high)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProbabilityError::OutOfRange { label, value });
            }
        }
        let sum = low + high;
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ProbabilityError::BadSum(sum));
        }
        Ok(Self { low, high })
    }

    /// Probability of label `"0"`.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Probability of label `"1"`.
    pub fn high(&self) -> f64 {
        self.high
    }
}

impl TryFrom<BTreeMap<String, f64>> for Probabilities {
    type Error = ProbabilityError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let low = *map.get("0").ok_or(ProbabilityError::MissingLabel("0"))?;
        let high = *map.get("1").ok_or(ProbabilityError::MissingLabel("1"))?;
        Self::new(low, high)
    }
}

impl From<Probabilities> for BTreeMap<String, f64> {
    fn from(p: Probabilities) -> Self {
        BTreeMap::from([("0".to_string(), p.low), ("1".to_string(), p.high)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: RiskLabel,
    pub probas: Probabilities,
}

// Success body: {"result": {"prediction": "1", "probas": {"0": .., "1": ..}}}
#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    pub result: PredictionOutcome,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Pull a readable message out of an error body's `detail` field.
///
/// A string detail is returned as is. A list of validation entries
/// (`{"loc": [...], "msg": ...}`) is rendered as `field: msg` pairs.
pub(crate) fn detail_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Array(entries) => {
            let parts: Vec<String> = entries.iter().filter_map(validation_entry).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn validation_entry(entry: &Value) -> Option<String> {
    let msg = entry.get("msg")?.as_str()?;
    let field = entry
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .map(|last| match last {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        });
    Some(match field {
        Some(field) => format!("{field}: {msg}"),
        None => msg.to_string(),
    })
}
