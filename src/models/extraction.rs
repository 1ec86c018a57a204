use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ReviewStatus;
use crate::pipeline::safety::types::{GuardrailOutcome, RiskFieldDecision};
use crate::pipeline::structuring::types::ClinicalExtraction;

/// One session note's extraction: payload, confidence, guardrail audit and
/// review state. Created once; afterwards only `review_status` moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: Uuid,
    pub session_id: String,
    pub schema_version: String,
    pub model_used: String,
    /// Drives review routing.
    pub overall_confidence: f64,
    /// Mean over populated non-risk fields, for display only.
    pub display_confidence: Option<f64>,
    pub requires_review: bool,
    pub guardrail_applied: bool,
    pub suicidal_guardrail_applied: bool,
    pub suicidal_guardrail_reason: Option<String>,
    pub homicidal_guardrail_applied: bool,
    pub homicidal_guardrail_reason: Option<String>,
    pub self_harm_guardrail_applied: bool,
    pub self_harm_guardrail_reason: Option<String>,
    pub criteria_validation_attempts: u32,
    pub discrepancy_count: u32,
    pub risk_decisions: Vec<RiskFieldDecision>,
    pub review_status: ReviewStatus,
    pub review_reasons: Vec<String>,
    pub extraction: ClinicalExtraction,
    pub created_at: String,
    /// Bumped on every status change; used for optimistic checks.
    pub version: i64,
}

impl ExtractionResult {
    /// Copy the guardrail outcome onto the result's flat audit fields.
    pub fn apply_guardrail(&mut self, outcome: GuardrailOutcome) {
        self.guardrail_applied = outcome.guardrail_applied();
        self.suicidal_guardrail_applied = outcome.suicidal.applied;
        self.suicidal_guardrail_reason = outcome.suicidal.reason;
        self.homicidal_guardrail_applied = outcome.homicidal.applied;
        self.homicidal_guardrail_reason = outcome.homicidal.reason;
        self.self_harm_guardrail_applied = outcome.self_harm.applied;
        self.self_harm_guardrail_reason = outcome.self_harm.reason;
        self.criteria_validation_attempts = outcome.criteria_validation_attempts;
        self.discrepancy_count = outcome.discrepancy_count;
        self.risk_decisions = outcome.decisions;
    }

    /// Guardrail diagnostics, or `None` when reconciliation never ran.
    ///
    /// "Never ran" and "ran and found nothing" are only told apart by the
    /// attempt count: at most one attempt and no discrepancies reads as no
    /// diagnostics.
    pub fn diagnostics(&self) -> Option<ExtractionDiagnostics> {
        if self.criteria_validation_attempts <= 1 && self.discrepancy_count == 0 {
            return None;
        }
        Some(ExtractionDiagnostics {
            guardrail_applied: self.guardrail_applied,
            suicidal_guardrail_applied: self.suicidal_guardrail_applied,
            suicidal_guardrail_reason: self.suicidal_guardrail_reason.clone(),
            homicidal_guardrail_applied: self.homicidal_guardrail_applied,
            homicidal_guardrail_reason: self.homicidal_guardrail_reason.clone(),
            self_harm_guardrail_applied: self.self_harm_guardrail_applied,
            self_harm_guardrail_reason: self.self_harm_guardrail_reason.clone(),
            criteria_validation_attempts: self.criteria_validation_attempts,
            discrepancy_count: self.discrepancy_count,
            risk_decisions: self.risk_decisions.clone(),
        })
    }
}

/// Read-side view of the guardrail audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    pub guardrail_applied: bool,
    pub suicidal_guardrail_applied: bool,
    pub suicidal_guardrail_reason: Option<String>,
    pub homicidal_guardrail_applied: bool,
    pub homicidal_guardrail_reason: Option<String>,
    pub self_harm_guardrail_applied: bool,
    pub self_harm_guardrail_reason: Option<String>,
    pub criteria_validation_attempts: u32,
    pub discrepancy_count: u32,
    pub risk_decisions: Vec<RiskFieldDecision>,
}

/// Row in the supervisor's pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReviewView {
    pub extraction_id: Uuid,
    pub session_id: String,
    pub overall_confidence: f64,
    pub guardrail_applied: bool,
    pub discrepancy_count: u32,
    pub review_reasons: Vec<String>,
    pub created_at: String,
    pub version: i64,
}

/// Extraction counts per review status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub not_flagged: u32,
    pub pending: u32,
    pub approved: u32,
    pub dismissed: u32,
}

impl ReviewStats {
    pub fn total(&self) -> u32 {
        self.not_flagged + self.pending + self.approved + self.dismissed
    }

    pub fn add(&mut self, status: ReviewStatus, count: u32) {
        match status {
            ReviewStatus::NotFlagged => self.not_flagged += count,
            ReviewStatus::Pending => self.pending += count,
            ReviewStatus::Approved => self.approved += count,
            ReviewStatus::Dismissed => self.dismissed += count,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// A routed-clean result with no guardrail activity.
    pub fn sample_result(overall_confidence: f64) -> ExtractionResult {
        ExtractionResult {
            id: Uuid::new_v4(),
            session_id: "session-001".into(),
            schema_version: "1.0".into(),
            model_used: "llama3.1:8b".into(),
            overall_confidence,
            display_confidence: None,
            requires_review: false,
            guardrail_applied: false,
            suicidal_guardrail_applied: false,
            suicidal_guardrail_reason: None,
            homicidal_guardrail_applied: false,
            homicidal_guardrail_reason: None,
            self_harm_guardrail_applied: false,
            self_harm_guardrail_reason: None,
            criteria_validation_attempts: 1,
            discrepancy_count: 0,
            risk_decisions: Vec::new(),
            review_status: ReviewStatus::NotFlagged,
            review_reasons: Vec::new(),
            extraction: ClinicalExtraction::default(),
            created_at: "2026-01-05T10:00:00Z".into(),
            version: 1,
        }
    }
}
