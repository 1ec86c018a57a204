use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::scalar::{deserialize_lenient_confidence, try_parse_int};
use super::StructuringError;

// ═══════════════════════════════════════════
// Source Mapping
// ═══════════════════════════════════════════

/// Provenance of an extracted field: the quoted note text and its range.
///
/// Models send this either as a bare string (the quote) or as an object.
/// Unknown properties are ignored and unrecognized shapes decode to an
/// empty mapping instead of failing the surrounding field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceMapping {
    pub text: String,
    pub start_char: i64,
    pub end_char: i64,
    pub section: Option<String>,
}

impl SourceMapping {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl<'de> Deserialize<'de> for SourceMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SourceMappingVisitor;

        impl<'de> Visitor<'de> for SourceMappingVisitor {
            type Value = SourceMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a quoted string or a source mapping object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SourceMapping, E> {
                Ok(SourceMapping::from_text(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<SourceMapping, E> {
                Ok(SourceMapping::from_text(v))
            }

            fn visit_map<A>(self, mut map: A) -> Result<SourceMapping, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = SourceMapping::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "text" | "quote" | "source_text" | "sourceText" => {
                            let value = map.next_value::<Value>()?;
                            mapping.text = match value {
                                Value::String(s) => s,
                                Value::Null => String::new(),
                                other => other.to_string(),
                            };
                        }
                        "start_char" | "startChar" | "start" => {
                            let value = map.next_value::<Value>()?;
                            mapping.start_char = try_parse_int(&value).unwrap_or(0);
                        }
                        "end_char" | "endChar" | "end" => {
                            let value = map.next_value::<Value>()?;
                            mapping.end_char = try_parse_int(&value).unwrap_or(0);
                        }
                        "section" => {
                            let value = map.next_value::<Value>()?;
                            mapping.section = value.as_str().map(str::to_string);
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(mapping)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<SourceMapping, A::Error>
            where
                A: SeqAccess<'de>,
            {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(SourceMapping::default())
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<SourceMapping, E> {
                Ok(SourceMapping::default())
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<SourceMapping, E> {
                Ok(SourceMapping::default())
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<SourceMapping, E> {
                Ok(SourceMapping::default())
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<SourceMapping, E> {
                Ok(SourceMapping::default())
            }

            fn visit_unit<E: de::Error>(self) -> Result<SourceMapping, E> {
                Ok(SourceMapping::default())
            }
        }

        deserializer.deserialize_any(SourceMappingVisitor)
    }
}

// ═══════════════════════════════════════════
// Extracted Field
// ═══════════════════════════════════════════

/// One model-extracted value with its confidence and provenance.
/// Immutable once built; reconciliation replaces a field, never edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField<T> {
    #[serde(default = "Option::default")]
    value: Option<T>,
    #[serde(default, deserialize_with = "deserialize_lenient_confidence")]
    confidence: f64,
    #[serde(default)]
    source: Option<SourceMapping>,
}

impl<T> ExtractedField<T> {
    /// Build a field. Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(value: Option<T>, confidence: f64, source: Option<SourceMapping>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            value,
            confidence,
            source,
        }
    }

    /// A field the model left empty.
    pub fn empty() -> Self {
        Self::new(None, 0.0, None)
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source(&self) -> Option<&SourceMapping> {
        self.source.as_ref()
    }
}

impl ExtractedField<Value> {
    /// Text form of the value for audit records and comparisons.
    /// JSON null and empty strings count as "no value".
    pub fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

pub type FieldMap = BTreeMap<String, ExtractedField<Value>>;

// ═══════════════════════════════════════════
// Clinical Extraction
// ═══════════════════════════════════════════

/// The fixed categories of a clinical session extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionCategory {
    SessionInfo,
    PresentingConcerns,
    Mood,
    RiskAssessment,
    MentalStatus,
    Interventions,
    Diagnoses,
    TreatmentProgress,
    NextSteps,
    Metadata,
}

impl ExtractionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInfo => "session_info",
            Self::PresentingConcerns => "presenting_concerns",
            Self::Mood => "mood",
            Self::RiskAssessment => "risk_assessment",
            Self::MentalStatus => "mental_status",
            Self::Interventions => "interventions",
            Self::Diagnoses => "diagnoses",
            Self::TreatmentProgress => "treatment_progress",
            Self::NextSteps => "next_steps",
            Self::Metadata => "metadata",
        }
    }

    pub fn all() -> &'static [ExtractionCategory] {
        &[
            Self::SessionInfo,
            Self::PresentingConcerns,
            Self::Mood,
            Self::RiskAssessment,
            Self::MentalStatus,
            Self::Interventions,
            Self::Diagnoses,
            Self::TreatmentProgress,
            Self::NextSteps,
            Self::Metadata,
        ]
    }

    /// Match a (normalized, snake_case) JSON key to a category.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == key).or(match key {
            "risk" | "risk_indicators" => Some(Self::RiskAssessment),
            "mental_status_exam" | "mse" => Some(Self::MentalStatus),
            "diagnosis" => Some(Self::Diagnoses),
            "plan" | "next_step" => Some(Self::NextSteps),
            _ => None,
        })
    }
}

impl fmt::Display for ExtractionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured view of one session note. Every category is always present;
/// missing data shows up as empty maps or null-valued fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalExtraction {
    pub session_info: FieldMap,
    pub presenting_concerns: FieldMap,
    pub mood: FieldMap,
    pub risk_assessment: FieldMap,
    pub mental_status: FieldMap,
    pub interventions: FieldMap,
    pub diagnoses: FieldMap,
    pub treatment_progress: FieldMap,
    pub next_steps: FieldMap,
    pub metadata: FieldMap,
}

impl ClinicalExtraction {
    pub fn category(&self, category: ExtractionCategory) -> &FieldMap {
        match category {
            ExtractionCategory::SessionInfo => &self.session_info,
            ExtractionCategory::PresentingConcerns => &self.presenting_concerns,
            ExtractionCategory::Mood => &self.mood,
            ExtractionCategory::RiskAssessment => &self.risk_assessment,
            ExtractionCategory::MentalStatus => &self.mental_status,
            ExtractionCategory::Interventions => &self.interventions,
            ExtractionCategory::Diagnoses => &self.diagnoses,
            ExtractionCategory::TreatmentProgress => &self.treatment_progress,
            ExtractionCategory::NextSteps => &self.next_steps,
            ExtractionCategory::Metadata => &self.metadata,
        }
    }

    pub fn category_mut(&mut self, category: ExtractionCategory) -> &mut FieldMap {
        match category {
            ExtractionCategory::SessionInfo => &mut self.session_info,
            ExtractionCategory::PresentingConcerns => &mut self.presenting_concerns,
            ExtractionCategory::Mood => &mut self.mood,
            ExtractionCategory::RiskAssessment => &mut self.risk_assessment,
            ExtractionCategory::MentalStatus => &mut self.mental_status,
            ExtractionCategory::Interventions => &mut self.interventions,
            ExtractionCategory::Diagnoses => &mut self.diagnoses,
            ExtractionCategory::TreatmentProgress => &mut self.treatment_progress,
            ExtractionCategory::NextSteps => &mut self.next_steps,
            ExtractionCategory::Metadata => &mut self.metadata,
        }
    }

    pub fn risk_field(&self, name: &str) -> Option<&ExtractedField<Value>> {
        self.risk_assessment.get(name)
    }
}

// ═══════════════════════════════════════════
// LLM boundary
// ═══════════════════════════════════════════

/// Model-invocation collaborator (allows mocking).
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError>;
}
