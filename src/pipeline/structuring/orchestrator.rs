use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use super::confidence::compute_overall_confidence;
use super::ollama::generate_bounded;
use super::parser::{extract_json, parse_clinical_extraction};
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::sanitize::sanitize_llm_output;
use super::types::{ClinicalExtraction, LlmClient};
use super::StructuringError;
use crate::config::PipelineConfig;
use crate::db::repository::now_timestamp;
use crate::models::ExtractionResult;
use crate::pipeline::safety::guardrail::GuardrailEngine;
use crate::review::routing::compute_review_routing;
use crate::review::store::ExtractionStore;

/// Minimum session note length for extraction (characters).
pub const MIN_INPUT_LENGTH: usize = 20;

/// Runs one session note through extraction, confidence, guardrail and
/// review routing:
/// prompt → LLM → sanitize → normalize → parse → confidence → guardrail → routing
pub struct ExtractionPipeline {
    llm: Arc<dyn LlmClient>,
    config: PipelineConfig,
    timeout: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExtractionPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        Self {
            llm,
            config,
            timeout,
            cancel: None,
        }
    }

    /// Override the per-call bound (primary and re-validation calls alike).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract one session note into a routed `ExtractionResult`.
    ///
    /// Primary LLM failures are returned. An unparseable response is not:
    /// it yields an empty extraction with 0.0 confidence, which the
    /// guardrail re-checks and routing sends to review.
    pub fn process(
        &self,
        session_id: &str,
        session_text: &str,
        prior_history: Option<&str>,
    ) -> Result<ExtractionResult, StructuringError> {
        let _span = tracing::info_span!(
            "process_session",
            session_id,
            model = %self.config.extraction_model
        )
        .entered();

        if session_text.trim().chars().count() < MIN_INPUT_LENGTH {
            return Err(StructuringError::InputTooShort(MIN_INPUT_LENGTH));
        }

        // Step 1: Primary extraction
        let prompt = build_extraction_prompt(session_text, prior_history);
        let raw = generate_bounded(
            &self.llm,
            &self.config.extraction_model,
            &prompt,
            EXTRACTION_SYSTEM_PROMPT,
            self.timeout,
            self.cancel.as_deref(),
        )?;

        // Step 2: Normalize and decode; a bad payload degrades to empty
        let mut extraction = self.decode(&raw);

        // Step 3: Confidence
        let confidence = compute_overall_confidence(&extraction);

        // Step 4: Guardrail re-validation on risk fields
        let mut engine =
            GuardrailEngine::new(Arc::clone(&self.llm), &self.config).with_timeout(self.timeout);
        if let Some(cancel) = &self.cancel {
            engine = engine.with_cancel(Arc::clone(cancel));
        }
        let outcome = engine.run(session_text, &mut extraction);

        // Step 5: Review routing
        let routing =
            compute_review_routing(confidence.overall, self.config.confidence_threshold, &outcome);

        let mut result = ExtractionResult {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            schema_version: self.config.schema_version.clone(),
            model_used: self.config.extraction_model.clone(),
            overall_confidence: confidence.overall.value(),
            display_confidence: confidence.display_mean.map(|c| c.value()),
            requires_review: routing.requires_review,
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
            review_status: routing.status,
            review_reasons: routing.reasons,
            extraction,
            created_at: now_timestamp(),
            version: 1,
        };
        result.apply_guardrail(outcome);

        tracing::info!(
            extraction_id = %result.id,
            overall_confidence = result.overall_confidence,
            attempts = result.criteria_validation_attempts,
            discrepancies = result.discrepancy_count,
            review_status = result.review_status.as_str(),
            "Session extraction complete"
        );

        Ok(result)
    }

    /// Run `process` and persist the result with its risk decisions.
    pub fn process_and_store(
        &self,
        conn: &Connection,
        store: &dyn ExtractionStore,
        session_id: &str,
        session_text: &str,
        prior_history: Option<&str>,
    ) -> Result<ExtractionResult, StructuringError> {
        let result = self.process(session_id, session_text, prior_history)?;
        store.save_result(conn, &result)?;
        Ok(result)
    }

    fn decode(&self, raw: &str) -> ClinicalExtraction {
        let cleaned = sanitize_llm_output(raw);
        match parse_clinical_extraction(&extract_json(&cleaned)) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    response_len = raw.len(),
                    "Extraction response unusable, continuing with empty extraction"
                );
                ClinicalExtraction::default()
            }
        }
    }
}
