use risk_predictor::{format_probability, project, FormError, PredictionOutcome};
use telemetry_feed::TelemetrySnapshot;

pub fn prediction_lines(outcome: &PredictionOutcome) -> Vec<String> {
    let risk = project(outcome);
    vec![
        format!(
            "[ risk ] {}%  category={}  prediction={}",
            risk.percentage,
            risk.category.as_str(),
            outcome.prediction.describe()
        ),
        format!(
            "[ risk ] p(high)={}  p(low)={}",
            format_probability(outcome.probas.high()),
            format_probability(outcome.probas.low())
        ),
        format!("[ advice ] {}", risk.category.recommendation()),
    ]
}

pub fn form_issue_lines(err: &FormError) -> Vec<String> {
    err.issues
        .iter()
        .map(|issue| format!("[ form ] {issue}"))
        .collect()
}

pub fn dashboard_line(snapshot: &TelemetrySnapshot) -> String {
    let view = snapshot.dashboard();
    let mut line = format!(
        "[ metrics ] events={}  good={}  internal={}  api={}",
        view.summary.total(),
        view.summary.nominal,
        view.summary.internal_fault,
        view.summary.api_fault
    );
    if let Some(stats) = view.stats {
        line.push_str(&format!(
            "  latency min/mean/max={:.2}/{:.2}/{:.2}ms",
            stats.min_ms, stats.mean_ms, stats.max_ms
        ));
    }
    if let Some(latest) = view.latest {
        line.push_str(&format!(
            "  latest={} ({}) {}ms @ {}",
            latest.status,
            if latest.ok { "ok" } else { "fail" },
            latest.latency,
            latest.time
        ));
    }
    if snapshot.failures > 0 {
        line.push_str(&format!("  poll_failures={}", snapshot.failures));
        if let Some(err) = &snapshot.last_error {
            line.push_str(&format!(" last_error=\"{err}\""));
        }
    }
    line
}
