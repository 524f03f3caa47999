use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// One recorded outcome of a past service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "de_status")]
    pub status: String,
    /// Milliseconds; finite and non-negative.
    #[serde(deserialize_with = "de_latency")]
    pub latency: f64,
}

impl TelemetryEvent {
    pub fn new(timestamp: DateTime<Utc>, status: impl Into<String>, latency: f64) -> Self {
        Self {
            timestamp,
            status: status.into(),
            latency,
        }
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an RFC 3339 instant, or an ISO-8601 datetime without offset
/// (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(Number),
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Text(raw) => parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp {raw:?}"))),
        // Epoch numbers are milliseconds.
        Scalar::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| de::Error::custom(format!("epoch timestamp out of range: {n}"))),
    }
}

fn de_status<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(d)? {
        Scalar::Text(status) => status,
        Scalar::Number(code) => code.to_string(),
    })
}

fn de_latency<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let latency = f64::deserialize(d)?;
    if !latency.is_finite() || latency < 0.0 {
        return Err(de::Error::custom(format!(
            "latency must be a non-negative number of milliseconds, got {latency}"
        )));
    }
    Ok(latency)
}
