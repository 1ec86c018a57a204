use serde::{Deserialize, Serialize};

use super::severity::RiskField;

/// Rule recorded when both candidate values were available.
pub const RULE_CONSERVATIVE_MERGE: &str = "conservative_merge";

/// Rule recorded when the second pass errored, timed out or was cancelled.
pub const RULE_RE_EXTRACTION_FAILED: &str = "re_extraction_failed";

/// Why a risk field was sent through the second pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailReason {
    /// Direct threat language in the session text.
    ExplicitThreats,
    /// Risk keyword in the session text.
    KeywordPresent,
    /// Field confidence under the risk threshold.
    LowConfidence,
}

impl GuardrailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitThreats => "explicit_threats",
            Self::KeywordPresent => "keyword_present",
            Self::LowConfidence => "low_confidence",
        }
    }

    /// Lower wins when several triggers fire for one field.
    pub fn priority(&self) -> u8 {
        match self {
            Self::ExplicitThreats => 0,
            Self::KeywordPresent => 1,
            Self::LowConfidence => 2,
        }
    }
}

/// Immutable audit record for one risk field that went through the
/// second pass. Both candidate values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFieldDecision {
    pub field: String,
    pub original_value: String,
    pub re_extracted_value: String,
    pub final_value: String,
    pub rule_applied: String,
    pub criteria_used: Vec<String>,
    pub reasoning_used: String,
}

/// Per-field "this was specifically scrutinized" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailFlag {
    pub applied: bool,
    /// Machine-readable reason, e.g. `keyword_present`.
    pub reason: Option<String>,
}

impl GuardrailFlag {
    pub fn applied(reason: GuardrailReason) -> Self {
        Self {
            applied: true,
            reason: Some(reason.as_str().to_string()),
        }
    }
}

/// Everything the guardrail pass contributes to an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub suicidal: GuardrailFlag,
    pub homicidal: GuardrailFlag,
    pub self_harm: GuardrailFlag,
    /// Primary pass counts as 1; each re-validation adds 1.
    pub criteria_validation_attempts: u32,
    pub discrepancy_count: u32,
    pub decisions: Vec<RiskFieldDecision>,
}

impl Default for GuardrailOutcome {
    fn default() -> Self {
        Self {
            suicidal: GuardrailFlag::default(),
            homicidal: GuardrailFlag::default(),
            self_harm: GuardrailFlag::default(),
            criteria_validation_attempts: 1,
            discrepancy_count: 0,
            decisions: Vec::new(),
        }
    }
}

impl GuardrailOutcome {
    pub fn guardrail_applied(&self) -> bool {
        self.suicidal.applied || self.homicidal.applied || self.self_harm.applied
    }

    pub fn flag(&self, field: RiskField) -> &GuardrailFlag {
        match field {
            RiskField::SuicidalIdeation => &self.suicidal,
            RiskField::HomicidalIdeation => &self.homicidal,
            RiskField::SelfHarm => &self.self_harm,
        }
    }

    pub fn flag_mut(&mut self, field: RiskField) -> &mut GuardrailFlag {
        match field {
            RiskField::SuicidalIdeation => &mut self.suicidal,
            RiskField::HomicidalIdeation => &mut self.homicidal,
            RiskField::SelfHarm => &mut self.self_harm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outcome_counts_primary_pass() {
        let outcome = GuardrailOutcome::default();
        assert_eq!(outcome.criteria_validation_attempts, 1);
        assert!(!outcome.guardrail_applied());
    }

    #[test]
    fn any_flag_marks_guardrail_applied() {
        let mut outcome = GuardrailOutcome::default();
        *outcome.flag_mut(RiskField::SelfHarm) = GuardrailFlag::applied(GuardrailReason::KeywordPresent);
        assert!(outcome.guardrail_applied());
        assert_eq!(
            outcome.flag(RiskField::SelfHarm).reason.as_deref(),
            Some("keyword_present")
        );
        assert!(!outcome.flag(RiskField::HomicidalIdeation).applied);
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&GuardrailReason::ExplicitThreats).unwrap();
        assert_eq!(json, "\"explicit_threats\"");
    }

    #[test]
    fn explicit_threats_take_priority() {
        let mut reasons = [
            GuardrailReason::LowConfidence,
            GuardrailReason::ExplicitThreats,
            GuardrailReason::KeywordPresent,
        ];
        reasons.sort_by_key(|r| r.priority());
        assert_eq!(reasons[0], GuardrailReason::ExplicitThreats);
    }
}
