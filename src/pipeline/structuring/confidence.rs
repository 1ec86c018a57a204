use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{ClinicalExtraction, ExtractionCategory};
use crate::pipeline::safety::severity::RiskField;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{argument} must be within [0.0, 1.0], got {value}")]
pub struct ConfidenceRangeError {
    pub argument: &'static str,
    pub value: f64,
}

/// A confidence value guaranteed to lie within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfidenceScore(f64);

impl ConfidenceScore {
    pub fn new(value: f64) -> Result<Self, ConfidenceRangeError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceRangeError {
                argument: "value",
                value,
            })
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Inclusive: a score equal to the threshold passes.
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl TryFrom<f64> for ConfidenceScore {
    type Error = ConfidenceRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfidenceScore> for f64 {
    fn from(score: ConfidenceScore) -> f64 {
        score.0
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Confidence figures for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    /// Drives review routing.
    pub overall: ConfidenceScore,
    /// Lowest confidence among the risk-assessment fields.
    pub risk_minimum: Option<ConfidenceScore>,
    /// Mean over populated non-risk fields, for display.
    pub display_mean: Option<ConfidenceScore>,
}

/// Aggregate field confidences into one overall score.
///
/// Overall = minimum over the tracked risk fields plus any other field in
/// the risk-assessment category. A tracked risk field the model omitted
/// counts as 0.0, so a missing risk reading always routes to review.
pub fn compute_overall_confidence(extraction: &ClinicalExtraction) -> ConfidenceSummary {
    let risk = extraction.category(ExtractionCategory::RiskAssessment);

    let mut risk_min = RiskField::all()
        .iter()
        .map(|f| risk.get(f.key()).map(|field| field.confidence()).unwrap_or(0.0))
        .fold(f64::INFINITY, f64::min);
    for field in risk.values() {
        risk_min = risk_min.min(field.confidence());
    }

    let non_risk: Vec<f64> = ExtractionCategory::all()
        .iter()
        .filter(|c| **c != ExtractionCategory::RiskAssessment)
        .flat_map(|c| extraction.category(*c).values())
        .filter(|f| f.value_text().is_some())
        .map(|f| f.confidence())
        .collect();
    let display_mean = if non_risk.is_empty() {
        None
    } else {
        Some(non_risk.iter().sum::<f64>() / non_risk.len() as f64)
    };

    let risk_minimum = clamp_score(risk_min);
    ConfidenceSummary {
        overall: risk_minimum,
        risk_minimum: Some(risk_minimum),
        display_mean: display_mean.map(clamp_score),
    }
}

/// Field confidences are already clamped on construction; this only guards
/// the arithmetic above.
fn clamp_score(value: f64) -> ConfidenceScore {
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    ConfidenceScore(v)
}
