use std::sync::Arc;

use super::orchestrator::ExtractionPipeline;
use super::StructuringError;
use crate::models::ExtractionResult;

/// One session note queued for batch extraction.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub session_id: String,
    pub session_text: String,
    pub prior_history: Option<String>,
}

impl SessionInput {
    pub fn new(session_id: impl Into<String>, session_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session_text: session_text.into(),
            prior_history: None,
        }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.prior_history = Some(history.into());
        self
    }
}

/// Process several sessions in parallel on the blocking pool.
///
/// Results come back in input order. A failing or panicking session only
/// fills its own slot.
pub async fn process_sessions(
    pipeline: Arc<ExtractionPipeline>,
    sessions: Vec<SessionInput>,
) -> Vec<Result<ExtractionResult, StructuringError>> {
    let total = sessions.len();
    let handles: Vec<_> = sessions
        .into_iter()
        .map(|session| {
            let pipeline = Arc::clone(&pipeline);
            let session_id = session.session_id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                pipeline.process(
                    &session.session_id,
                    &session.session_text,
                    session.prior_history.as_deref(),
                )
            });
            (session_id, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for (session_id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(session_id = %session_id, error = %join_err, "Session extraction task failed");
                Err(StructuringError::TaskFailed(format!(
                    "session {session_id}: {join_err}"
                )))
            }
        };
        if let Err(e) = &result {
            tracing::warn!(session_id = %session_id, error = %e, "Session extraction failed");
        }
        results.push(result);
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(total, failed, "Batch extraction complete");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::models::enums::ReviewStatus;
    use crate::pipeline::structuring::ollama::MockLlmClient;

    const RESPONSE: &str = r#"```json
{"risk_assessment": {
  "suicidal_ideation": {"value": "None", "confidence": 0.95},
  "homicidal_ideation": {"value": "None", "confidence": 0.95},
  "self_harm": {"value": "None", "confidence": 0.95}
}}
```"#;

    fn pipeline() -> Arc<ExtractionPipeline> {
        Arc::new(ExtractionPipeline::new(
            Arc::new(MockLlmClient::new(RESPONSE)),
            PipelineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let sessions = vec![
            SessionInput::new("a", "Client reports steady mood and good sleep this week."),
            SessionInput::new("b", "Discussed boundaries with family; client feels calmer.")
                .with_history("Adjustment disorder, 2025."),
        ];
        let results = process_sessions(pipeline(), sessions).await;

        assert_eq!(results.len(), 2);
        let ids: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().session_id.clone())
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert!(results
            .iter()
            .all(|r| r.as_ref().unwrap().review_status == ReviewStatus::NotFlagged));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_others() {
        let sessions = vec![
            SessionInput::new("short", "hi"),
            SessionInput::new("ok", "Client reports steady mood and good sleep this week."),
        ];
        let results = process_sessions(pipeline(), sessions).await;

        assert!(matches!(results[0], Err(StructuringError::InputTooShort(_))));
        assert_eq!(results[1].as_ref().unwrap().session_id, "ok");
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(process_sessions(pipeline(), Vec::new()).await.is_empty());
    }
}
