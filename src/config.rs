use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::model_router::{resolve_model, TASK_EXTRACTION, TASK_RISK_REVALIDATION};

/// Application-level constants
pub const APP_NAME: &str = "TherapyNote";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the clinical extraction schema written into every result.
pub const EXTRACTION_SCHEMA_VERSION: &str = "1.0";

/// Prefix for environment overrides (`THERAPYNOTE_CONFIDENCE_THRESHOLD`, ...).
const ENV_PREFIX: &str = "THERAPYNOTE_";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "therapynote_lib=info,warn"
}

/// Get the application data directory.
/// ~/TherapyNote/ on all platforms. Falls back to the working directory
/// when no home directory can be determined (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the extraction database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("extractions.db")
}

/// Tunables for the extraction → guardrail → review pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall confidence below this routes the extraction to review.
    pub confidence_threshold: f64,
    /// A risk field below this confidence gets a guardrail re-validation pass.
    pub risk_confidence_threshold: f64,
    /// Upper bound for any single LLM call, primary or re-validation.
    pub llm_timeout_secs: u64,
    pub ollama_base_url: String,
    pub extraction_model: String,
    pub revalidation_model: String,
    pub database_path: PathBuf,
    pub schema_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            risk_confidence_threshold: 0.80,
            llm_timeout_secs: 120,
            ollama_base_url: "http://localhost:11434".to_string(),
            extraction_model: resolve_model(TASK_EXTRACTION).to_string(),
            revalidation_model: resolve_model(TASK_RISK_REVALIDATION).to_string(),
            database_path: default_database_path(),
            schema_version: EXTRACTION_SCHEMA_VERSION.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with `THERAPYNOTE_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from any key → value source. Unparseable values are
    /// ignored with a warning so a typo never takes the pipeline down.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override::<f64>(&lookup, "CONFIDENCE_THRESHOLD") {
            if (0.0..=1.0).contains(&v) {
                self.confidence_threshold = v;
            } else {
                tracing::warn!(value = v, "CONFIDENCE_THRESHOLD out of [0, 1], ignored");
            }
        }
        if let Some(v) = parse_override::<f64>(&lookup, "RISK_CONFIDENCE_THRESHOLD") {
            if (0.0..=1.0).contains(&v) {
                self.risk_confidence_threshold = v;
            } else {
                tracing::warn!(value = v, "RISK_CONFIDENCE_THRESHOLD out of [0, 1], ignored");
            }
        }
        if let Some(v) = parse_override::<u64>(&lookup, "LLM_TIMEOUT_SECS") {
            self.llm_timeout_secs = v.max(1);
        }
        if let Some(v) = lookup("OLLAMA_URL").filter(|s| !s.trim().is_empty()) {
            self.ollama_base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("EXTRACTION_MODEL").filter(|s| !s.trim().is_empty()) {
            self.extraction_model = v.trim().to_string();
        }
        if let Some(v) = lookup("REVALIDATION_MODEL").filter(|s| !s.trim().is_empty()) {
            self.revalidation_model = v.trim().to_string();
        }
        if let Some(v) = lookup("DATABASE_PATH").filter(|s| !s.trim().is_empty()) {
            self.database_path = PathBuf::from(v.trim());
        }
        self
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, "Unparseable configuration override, ignored");
            None
        }
    }
}
