//! Risk guardrail: second-opinion extraction and conservative merge for
//! the suicidal ideation, homicidal ideation and self-harm fields.
//!
//! A field is re-checked when its confidence is under the risk threshold
//! or the session text contains risk language. The re-check result is
//! merged with the original so a disagreement always resolves toward the
//! more severe reading. Every re-check leaves a `RiskFieldDecision`, also
//! when the second call fails.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::keywords::detect_risk_keywords;
use super::severity::{RiskField, Severity};
use super::types::{
    GuardrailFlag, GuardrailOutcome, GuardrailReason, RiskFieldDecision,
    RULE_CONSERVATIVE_MERGE, RULE_RE_EXTRACTION_FAILED,
};
use crate::config::PipelineConfig;
use crate::pipeline::structuring::ollama::generate_bounded;
use crate::pipeline::structuring::parser::{
    extract_json, parse_revalidation_response, RevalidationAnswer,
};
use crate::pipeline::structuring::prompt::{build_revalidation_prompt, REVALIDATION_SYSTEM_PROMPT};
use crate::pipeline::structuring::sanitize::sanitize_llm_output;
use crate::pipeline::structuring::types::{ClinicalExtraction, ExtractedField, LlmClient};
use crate::pipeline::structuring::StructuringError;

/// A risk field selected for re-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailTrigger {
    pub field: RiskField,
    /// Highest-priority reason among everything that fired.
    pub reason: GuardrailReason,
    /// Criteria that fired, for the prompt and the audit record.
    pub criteria: Vec<String>,
}

/// Result of reconciling two candidate values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub final_value: String,
    pub discrepancy: bool,
}

/// Conservative merge of an original and a re-extracted value.
///
/// Agreement keeps the original verbatim. Disagreement picks the value with
/// the higher rank on the field's ladder. Text that matches no level only
/// wins over "none", so it never replaces a detected risk level. Two
/// different unrecognized values keep the original; both stay in the audit
/// record.
pub fn conservative_merge(field: RiskField, original: Option<&str>, re_extracted: &str) -> MergeResult {
    let original_sev = field.severity_of(original);
    let re_sev = field.severity_of(Some(re_extracted));
    let original_text = original.unwrap_or("");

    let agree = match (original_sev, re_sev) {
        (Severity::Known(a), Severity::Known(b)) => a == b,
        _ => original_text.trim().eq_ignore_ascii_case(re_extracted.trim()),
    };

    if agree {
        let final_value = if original_text.trim().is_empty() {
            re_extracted.to_string()
        } else {
            original_text.to_string()
        };
        return MergeResult {
            final_value,
            discrepancy: false,
        };
    }

    let final_value = if re_sev > original_sev {
        re_extracted.to_string()
    } else {
        original_text.to_string()
    };
    MergeResult {
        final_value,
        discrepancy: true,
    }
}

/// Runs the second pass over risk fields.
pub struct GuardrailEngine {
    llm: Arc<dyn LlmClient>,
    model: String,
    risk_confidence_threshold: f64,
    timeout: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl GuardrailEngine {
    pub fn new(llm: Arc<dyn LlmClient>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            model: config.revalidation_model.clone(),
            risk_confidence_threshold: config.risk_confidence_threshold,
            timeout: Duration::from_secs(config.llm_timeout_secs),
            cancel: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Decide which risk fields need a second opinion.
    pub fn triggers(&self, extraction: &ClinicalExtraction, session_text: &str) -> Vec<GuardrailTrigger> {
        let hits = detect_risk_keywords(session_text);

        RiskField::all()
            .iter()
            .filter_map(|&field| {
                let mut reasons = Vec::new();
                let mut criteria = Vec::new();

                for hit in hits.iter().filter(|h| h.field == field) {
                    reasons.push(hit.reason);
                    criteria.push(hit.description.to_string());
                }

                let confidence = extraction
                    .risk_field(field.key())
                    .map(|f| f.confidence())
                    .unwrap_or(0.0);
                if confidence < self.risk_confidence_threshold {
                    reasons.push(GuardrailReason::LowConfidence);
                    criteria.push(format!(
                        "Field confidence {confidence:.2} below {:.2}",
                        self.risk_confidence_threshold
                    ));
                }

                let reason = reasons.into_iter().min_by_key(|r| r.priority())?;
                Some(GuardrailTrigger {
                    field,
                    reason,
                    criteria,
                })
            })
            .collect()
    }

    /// Re-check every triggered field, updating `extraction` in place when
    /// the merge escalates a value.
    pub fn run(&self, session_text: &str, extraction: &mut ClinicalExtraction) -> GuardrailOutcome {
        let mut outcome = GuardrailOutcome::default();

        for trigger in self.triggers(extraction, session_text) {
            outcome.criteria_validation_attempts += 1;
            *outcome.flag_mut(trigger.field) = GuardrailFlag::applied(trigger.reason);

            let (decision, discrepancy) = self.recheck(&trigger, session_text, extraction);
            if discrepancy {
                outcome.discrepancy_count += 1;
            }
            outcome.decisions.push(decision);
        }

        outcome
    }

    fn recheck(
        &self,
        trigger: &GuardrailTrigger,
        session_text: &str,
        extraction: &mut ClinicalExtraction,
    ) -> (RiskFieldDecision, bool) {
        let field = trigger.field;
        let key = field.key();
        let original = extraction.risk_field(key).cloned();
        let original_text = original.as_ref().and_then(|f| f.value_text());

        match self.second_opinion(trigger, session_text) {
            Ok(answer) => {
                let merged = conservative_merge(field, original_text.as_deref(), &answer.value);

                let keeps_original = original_text.as_deref() == Some(merged.final_value.as_str());
                if !keeps_original {
                    let source = original.as_ref().and_then(|f| f.source().cloned());
                    let confidence = answer
                        .confidence
                        .or_else(|| original.as_ref().map(|f| f.confidence()))
                        .unwrap_or(0.0);
                    extraction.risk_assessment.insert(
                        key.to_string(),
                        ExtractedField::new(Some(Value::String(merged.final_value.clone())), confidence, source),
                    );
                }

                tracing::info!(
                    field = key,
                    reason = trigger.reason.as_str(),
                    rule = RULE_CONSERVATIVE_MERGE,
                    discrepancy = merged.discrepancy,
                    "Risk field re-validated"
                );

                let mut criteria = trigger.criteria.clone();
                for c in answer.criteria {
                    if !criteria.contains(&c) {
                        criteria.push(c);
                    }
                }

                let decision = RiskFieldDecision {
                    field: key.to_string(),
                    original_value: original_text.unwrap_or_default(),
                    re_extracted_value: answer.value,
                    final_value: merged.final_value,
                    rule_applied: RULE_CONSERVATIVE_MERGE.to_string(),
                    criteria_used: criteria,
                    reasoning_used: answer.reasoning.unwrap_or_default(),
                };
                (decision, merged.discrepancy)
            }
            Err(e) => {
                tracing::warn!(
                    field = key,
                    reason = trigger.reason.as_str(),
                    rule = RULE_RE_EXTRACTION_FAILED,
                    error = %e,
                    "Risk field re-extraction failed, keeping original value"
                );
                let original_value = original_text.unwrap_or_default();
                let decision = RiskFieldDecision {
                    field: key.to_string(),
                    final_value: original_value.clone(),
                    original_value,
                    re_extracted_value: String::new(),
                    rule_applied: RULE_RE_EXTRACTION_FAILED.to_string(),
                    criteria_used: trigger.criteria.clone(),
                    reasoning_used: format!("Re-extraction failed: {e}"),
                };
                (decision, false)
            }
        }
    }

    fn second_opinion(
        &self,
        trigger: &GuardrailTrigger,
        session_text: &str,
    ) -> Result<RevalidationAnswer, StructuringError> {
        let prompt = build_revalidation_prompt(trigger.field, session_text, &trigger.criteria);
        let raw = generate_bounded(
            &self.llm,
            &self.model,
            &prompt,
            REVALIDATION_SYSTEM_PROMPT,
            self.timeout,
            self.cancel.as_deref(),
        )?;
        let cleaned = sanitize_llm_output(&raw);
        parse_revalidation_response(&extract_json(&cleaned), trigger.field.key())
    }
}
