//! Task → model routing.
//!
//! A constant lookup table keyed by task name. Unknown task names fall back
//! to `DEFAULT_MODEL`; there is no process-wide mutable routing state.
//! Operators override the resolved names through `PipelineConfig`.

/// Primary clinical extraction of a full session note.
pub const TASK_EXTRACTION: &str = "clinical_extraction";
/// Guardrail second opinion on a single risk field.
pub const TASK_RISK_REVALIDATION: &str = "risk_revalidation";
/// Free-text session summary.
pub const TASK_SUMMARY: &str = "summary";

/// Model used for any task the table does not know.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

const MODEL_ROUTES: &[(&str, &str)] = &[
    (TASK_EXTRACTION, "llama3.1:8b"),
    (TASK_RISK_REVALIDATION, "llama3.1:70b"),
    (TASK_SUMMARY, "llama3.2:3b"),
];

/// Resolve the model name for a task.
pub fn resolve_model(task: &str) -> &'static str {
    let task = task.trim();
    MODEL_ROUTES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(task))
        .map(|(_, model)| *model)
        .unwrap_or(DEFAULT_MODEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tasks_resolve_from_table() {
        assert_eq!(resolve_model(TASK_EXTRACTION), "llama3.1:8b");
        assert_eq!(resolve_model(TASK_RISK_REVALIDATION), "llama3.1:70b");
        assert_eq!(resolve_model(TASK_SUMMARY), "llama3.2:3b");
    }

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(resolve_model("  Risk_Revalidation "), "llama3.1:70b");
    }

    #[test]
    fn unknown_task_uses_default() {
        assert_eq!(resolve_model("translation"), DEFAULT_MODEL);
        assert_eq!(resolve_model(""), DEFAULT_MODEL);
    }
}
