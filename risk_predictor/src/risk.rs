use serde::Serialize;

use crate::types::PredictionOutcome;

/// Percentage at or above which a patient is shown as high risk.
pub const HIGH_RISK_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    High,
}

impl RiskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            Self::High => {
                "Close medical monitoring recommended. Consider preventive intervention."
            }
            Self::Low => "Standard monitoring recommended. Keep up regular medical follow-up.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskProjection {
    pub percentage: u8,
    pub category: RiskCategory,
}

/// Display-ready risk derived from the probability of label `"1"`.
pub fn project(outcome: &PredictionOutcome) -> RiskProjection {
    // f64::round rounds half away from zero, which is half-up for p >= 0.
    let percentage = (outcome.probas.high() * 100.0).round().clamp(0.0, 100.0) as u8;
    let category = if percentage >= HIGH_RISK_THRESHOLD {
        RiskCategory::High
    } else {
        RiskCategory::Low
    };
    RiskProjection {
        percentage,
        category,
    }
}

/// One-decimal percentage text, e.g. `0.731` -> `"73.1%"`.
pub fn format_probability(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Probabilities, RiskLabel};

    fn outcome(p1: f64) -> PredictionOutcome {
        PredictionOutcome {
            prediction: if p1 >= 0.5 {
                RiskLabel::High
            } else {
                RiskLabel::Low
            },
            probas: Probabilities::new(1.0 - p1, p1).unwrap(),
        }
    }

    #[test]
    fn high_probability_projects_high() {
        let p = project(&outcome(0.73));
        assert_eq!(p.percentage, 73);
        assert_eq!(p.category, RiskCategory::High);
    }

    #[test]
    fn low_probability_projects_low() {
        let p = project(&outcome(0.12));
        assert_eq!(p.percentage, 12);
        assert_eq!(p.category, RiskCategory::Low);
    }

    #[test]
    fn boundary_rounds_up_into_high() {
        let p = project(&outcome(0.499999));
        assert_eq!(p.percentage, 50);
        assert_eq!(p.category, RiskCategory::High);

        let below = project(&outcome(0.494));
        assert_eq!(below.percentage, 49);
        assert_eq!(below.category, RiskCategory::Low);
    }

    #[test]
    fn extremes_stay_in_range() {
        assert_eq!(project(&outcome(0.0)).percentage, 0);
        assert_eq!(project(&outcome(1.0)).percentage, 100);
    }

    #[test]
    fn projection_is_idempotent() {
        let o = outcome(0.61);
        assert_eq!(project(&o), project(&o));
    }

    #[test]
    fn category_follows_percentage_across_grid() {
        for step in 0..=1000 {
            let p1 = f64::from(step) / 1000.0;
            let p = project(&outcome(p1));
            assert_eq!(p.percentage, (p1 * 100.0).round() as u8);
            assert_eq!(p.category == RiskCategory::High, p.percentage >= 50);
        }
    }

    #[test]
    fn formats_probability_with_one_decimal() {
        assert_eq!(format_probability(0.731), "73.1%");
        assert_eq!(format_probability(0.0), "0.0%");
        assert_eq!(RiskLabel::High.describe(), "High risk");
    }
}
