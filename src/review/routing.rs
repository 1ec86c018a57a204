use crate::models::enums::ReviewStatus;
use crate::pipeline::safety::severity::RiskField;
use crate::pipeline::safety::types::GuardrailOutcome;
use crate::pipeline::structuring::confidence::ConfidenceScore;

pub const DISCREPANCY_REASON: &str = "Risk field discrepancy detected";

/// Review decision computed when an extraction completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRouting {
    pub requires_review: bool,
    pub status: ReviewStatus,
    /// Confidence reason first, then guardrail reasons in field order,
    /// then the discrepancy reason.
    pub reasons: Vec<String>,
}

/// Combine confidence, guardrail flags and discrepancies into a routing.
pub fn compute_review_routing(
    overall_confidence: ConfidenceScore,
    threshold: f64,
    guardrail: &GuardrailOutcome,
) -> ReviewRouting {
    let mut reasons = Vec::new();

    if !overall_confidence.meets_threshold(threshold) {
        reasons.push(format!("Low confidence ({overall_confidence})"));
    }

    for field in RiskField::all() {
        if guardrail.flag(*field).applied {
            reasons.push(format!("{} guardrail triggered", field.label()));
        }
    }

    if guardrail.discrepancy_count > 0 {
        reasons.push(DISCREPANCY_REASON.to_string());
    }

    let requires_review = !reasons.is_empty();
    ReviewRouting {
        requires_review,
        status: if requires_review {
            ReviewStatus::Pending
        } else {
            ReviewStatus::NotFlagged
        },
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::safety::types::{GuardrailFlag, GuardrailReason};

    fn score(v: f64) -> ConfidenceScore {
        ConfidenceScore::new(v).unwrap()
    }

    #[test]
    fn low_confidence_only() {
        let r = compute_review_routing(score(0.55), 0.7, &GuardrailOutcome::default());
        assert!(r.requires_review);
        assert_eq!(r.status, ReviewStatus::Pending);
        assert_eq!(r.reasons, vec!["Low confidence (0.55)".to_string()]);
    }

    #[test]
    fn confident_clean_extraction_not_flagged() {
        let r = compute_review_routing(score(0.95), 0.7, &GuardrailOutcome::default());
        assert!(!r.requires_review);
        assert_eq!(r.status, ReviewStatus::NotFlagged);
        assert!(r.reasons.is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let r = compute_review_routing(score(0.7), 0.7, &GuardrailOutcome::default());
        assert!(!r.requires_review);
    }

    #[test]
    fn reasons_are_ordered() {
        let outcome = GuardrailOutcome {
            self_harm: GuardrailFlag::applied(GuardrailReason::KeywordPresent),
            homicidal: GuardrailFlag::applied(GuardrailReason::ExplicitThreats),
            criteria_validation_attempts: 3,
            discrepancy_count: 1,
            ..GuardrailOutcome::default()
        };
        let r = compute_review_routing(score(0.62), 0.7, &outcome);
        assert_eq!(
            r.reasons,
            vec![
                "Low confidence (0.62)".to_string(),
                "Homicidal ideation guardrail triggered".to_string(),
                "Self-harm guardrail triggered".to_string(),
                "Risk field discrepancy detected".to_string(),
            ]
        );
    }

    #[test]
    fn guardrail_alone_routes_to_review() {
        let outcome = GuardrailOutcome {
            suicidal: GuardrailFlag::applied(GuardrailReason::LowConfidence),
            criteria_validation_attempts: 2,
            ..GuardrailOutcome::default()
        };
        let r = compute_review_routing(score(0.9), 0.7, &outcome);
        assert_eq!(r.status, ReviewStatus::Pending);
        assert_eq!(r.reasons, vec!["Suicidal ideation guardrail triggered".to_string()]);
    }
}
