//! Response normalizer: arbitrary model text → JSON document → typed extraction.
//!
//! `extract_json` tries, in order:
//! 1. a leading ```json fence (closing fence = the LAST fence in the text)
//! 2. a leading bare ``` fence (same closing rule)
//! 3. any fenced block anywhere in the text (first match)
//! 4. the span from the first `{` to the last `}`
//! 5. the trimmed input unchanged

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::scalar::try_parse_confidence;
use super::types::{ClinicalExtraction, ExtractedField, ExtractionCategory};
use super::StructuringError;

const FENCE: &str = "```";

/// The fence scan never looks past this many bytes of model output.
const MAX_SCAN_BYTES: usize = 1024 * 1024;

// The regex crate matches in linear time, so no input can cause runaway
// backtracking; the size limit bounds compiled program memory.
static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n?(?s:(.*?))```")
        .size_limit(1 << 20)
        .build()
        .expect("valid regex")
});

/// Turn raw model output into the best available JSON text.
///
/// Total: never fails. When nothing JSON-like is found the trimmed input is
/// returned and the caller's JSON parse decides what to do with it.
pub fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(body) = strip_json_fence(trimmed).or_else(|| strip_bare_fence(trimmed)) {
        if let Some(end) = body.rfind(FENCE) {
            return body[..end].trim().to_string();
        }
    }

    if let Some(inner) = scan_fenced_block(trimmed) {
        return inner;
    }

    if let Some(object) = brace_span(trimmed) {
        return object.to_string();
    }

    trimmed.to_string()
}

/// Text after a leading ```json tag (case-insensitive), if present.
fn strip_json_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    let tag = rest.get(..4)?;
    if !tag.eq_ignore_ascii_case("json") {
        return None;
    }
    let body = &rest[4..];
    match body.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() => None,
        _ => Some(body),
    }
}

/// Text from the line after a leading untagged fence, if present.
fn strip_bare_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

fn scan_fenced_block(text: &str) -> Option<String> {
    let window = &text[..floor_char_boundary(text, MAX_SCAN_BYTES)];
    FENCED_BLOCK_RE
        .captures(window)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

// ═══════════════════════════════════════════
// Clinical extraction decoding
// ═══════════════════════════════════════════

/// Decode a normalized JSON document into a `ClinicalExtraction`.
///
/// Unknown categories are dropped, category and field keys are normalized
/// to snake_case, and each field decodes leniently. Only a document that is
/// not a JSON object at all is an error.
pub fn parse_clinical_extraction(json_text: &str) -> Result<ClinicalExtraction, StructuringError> {
    let root: Value = serde_json::from_str(json_text)
        .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;
    let root = match root {
        Value::Object(map) => unwrap_envelope(map),
        other => {
            return Err(StructuringError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut extraction = ClinicalExtraction::default();
    for (key, value) in root {
        let Some(category) = ExtractionCategory::from_key(&normalize_key(&key)) else {
            tracing::debug!(key = %key, "Ignoring unknown extraction category");
            continue;
        };
        let target = extraction.category_mut(category);
        match value {
            Value::Object(fields) => {
                for (name, raw) in fields {
                    target.insert(normalize_key(&name), field_from_value(&raw));
                }
            }
            Value::Null => {}
            Value::Array(_) => {
                target.insert("items".to_string(), field_from_value(&value));
            }
            scalar => {
                target.insert("summary".to_string(), field_from_value(&scalar));
            }
        }
    }
    Ok(extraction)
}

/// Models sometimes wrap the payload: `{"extraction": {...}}`.
fn unwrap_envelope(mut map: Map<String, Value>) -> Map<String, Value> {
    if map.len() != 1 || !matches!(map.values().next(), Some(Value::Object(_))) {
        return map;
    }
    let key = map.keys().next().cloned().unwrap_or_default();
    if ExtractionCategory::from_key(&normalize_key(&key)).is_some() {
        return map;
    }
    match map.remove(&key) {
        Some(Value::Object(inner)) => inner,
        _ => map,
    }
}

/// Decode one field. Objects carrying `value`/`confidence`/`source` use the
/// field shape; any other non-null JSON becomes a value with 0.0 confidence.
pub fn field_from_value(raw: &Value) -> ExtractedField<Value> {
    match raw {
        Value::Null => ExtractedField::empty(),
        Value::Object(obj)
            if obj.contains_key("value")
                || obj.contains_key("confidence")
                || obj.contains_key("source") =>
        {
            serde_json::from_value::<ExtractedField<Value>>(raw.clone())
                .unwrap_or_else(|_| ExtractedField::empty())
        }
        other => ExtractedField::new(Some(other.clone()), 0.0, None),
    }
}

/// `suicidalIdeation`, `Suicidal Ideation`, `suicidal-ideation` → `suicidal_ideation`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.trim().chars() {
        if c.is_ascii_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == ' ' || c == '-' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out.trim_end_matches('_').to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════
// Risk re-validation answers
// ═══════════════════════════════════════════

/// A second-opinion answer for a single risk field.
#[derive(Debug, Clone, PartialEq)]
pub struct RevalidationAnswer {
    pub value: String,
    pub confidence: Option<f64>,
    pub criteria: Vec<String>,
    pub reasoning: Option<String>,
}

/// Decode a re-validation answer. Unlike the main extraction this fails
/// when no value is present: a second opinion without a value is no opinion.
pub fn parse_revalidation_response(
    json_text: &str,
    field: &str,
) -> Result<RevalidationAnswer, StructuringError> {
    let root: Value = serde_json::from_str(json_text)
        .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;
    let obj = match root {
        Value::Object(obj) => obj,
        other => {
            return Err(StructuringError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let raw_value = ["value", "final_value", "finalValue", field]
        .iter()
        .find_map(|k| obj.get(*k))
        .ok_or_else(|| StructuringError::MalformedResponse("missing value".into()))?;

    // The model may answer with a full field object instead of a bare value.
    let (raw_value, nested_confidence) = match raw_value {
        Value::Object(inner) => (
            inner.get("value").cloned().unwrap_or(Value::Null),
            inner.get("confidence").and_then(try_parse_confidence),
        ),
        other => (other.clone(), None),
    };

    let value = match raw_value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(StructuringError::MalformedResponse("empty value".into())),
    };

    let criteria = match obj.get("criteria").or_else(|| obj.get("criteria_used")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    let reasoning = ["reasoning", "rationale"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(RevalidationAnswer {
        value,
        confidence: obj
            .get("confidence")
            .and_then(try_parse_confidence)
            .or(nested_confidence),
        criteria,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_is_unwrapped() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn json_fence_tag_is_case_insensitive() {
        assert_eq!(extract_json("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn json_fence_uses_last_closing_fence() {
        let input = "```json\n{\"note\": \"client typed ``` in chat\"}\n```";
        assert_eq!(extract_json(input), "{\"note\": \"client typed ``` in chat\"}");
    }

    #[test]
    fn bare_fence_is_unwrapped() {
        assert_eq!(extract_json("```\n{\"b\":2}\n```"), "{\"b\":2}");
    }

    #[test]
    fn fenced_block_inside_prose() {
        let input = "I think ```json\n{\"k\":\"v\"}\n``` final thoughts";
        assert_eq!(extract_json(input), "{\"k\":\"v\"}");
    }

    #[test]
    fn fenced_block_with_other_tag_inside_prose() {
        let input = "Here you go:\n```javascript\n{\"k\":1}\n```\nThanks!";
        assert_eq!(extract_json(input), "{\"k\":1}");
    }

    #[test]
    fn first_fenced_block_wins_in_prose() {
        let input = "a ```json\n{\"first\":1}\n``` b ```json\n{\"second\":2}\n``` c";
        assert_eq!(extract_json(input), "{\"first\":1}");
    }

    #[test]
    fn brace_fallback_without_fences() {
        assert_eq!(extract_json("Answer: {\"x\":2} done."), "{\"x\":2}");
    }

    #[test]
    fn unclosed_json_fence_falls_back_to_braces() {
        assert_eq!(extract_json("```json\n{\"x\":{\"y\":1}}"), "{\"x\":{\"y\":1}}");
    }

    #[test]
    fn garbage_is_returned_trimmed() {
        assert_eq!(extract_json("   no json here  "), "no json here");
        assert_eq!(extract_json("} backwards {"), "} backwards {");
        assert_eq!(extract_json(""), "");
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let input = format!("{}{{\"é\":1}}", "ü".repeat(10));
        assert_eq!(extract_json(&input), "{\"é\":1}");
    }

    #[test]
    fn normalize_key_variants() {
        assert_eq!(normalize_key("suicidalIdeation"), "suicidal_ideation");
        assert_eq!(normalize_key("Suicidal Ideation"), "suicidal_ideation");
        assert_eq!(normalize_key("self-harm"), "self_harm");
        assert_eq!(normalize_key("risk_assessment"), "risk_assessment");
        assert_eq!(normalize_key("PHQ9Score"), "phq9_score");
    }

    #[test]
    fn parse_extraction_with_mixed_shapes() {
        let json = r#"{
            "sessionInfo": {"date": {"value": "2026-03-02", "confidence": 0.98}},
            "mood": {"reported_mood": {"value": "low", "confidence": "0.7", "source": "I feel flat"}},
            "riskAssessment": {
                "suicidalIdeation": {"value": "Passive", "confidence": 0.6,
                    "source": {"text": "wouldn't mind not waking up", "startChar": 10, "endChar": 37}}
            },
            "diagnoses": [{"code": "F32.1"}],
            "next_steps": "Follow up in one week",
            "billing": {"code": "90837"}
        }"#;
        let extraction = parse_clinical_extraction(json).unwrap();

        let date = &extraction.session_info["date"];
        assert_eq!(date.value_text().as_deref(), Some("2026-03-02"));

        let mood = &extraction.mood["reported_mood"];
        assert!((mood.confidence() - 0.7).abs() < f64::EPSILON);
        assert_eq!(mood.source().unwrap().text, "I feel flat");

        let si = extraction.risk_field("suicidal_ideation").unwrap();
        assert_eq!(si.value_text().as_deref(), Some("Passive"));
        assert_eq!(si.source().unwrap().end_char, 37);

        assert!(extraction.diagnoses.contains_key("items"));
        assert_eq!(
            extraction.next_steps["summary"].value_text().as_deref(),
            Some("Follow up in one week")
        );
        assert!(extraction.interventions.is_empty());
    }

    #[test]
    fn parse_extraction_unwraps_envelope() {
        let json = r#"{"extraction": {"mood": {"affect": {"value": "flat", "confidence": 0.9}}}}"#;
        let extraction = parse_clinical_extraction(json).unwrap();
        assert!(extraction.mood.contains_key("affect"));
    }

    #[test]
    fn parse_extraction_rejects_non_object() {
        assert!(matches!(
            parse_clinical_extraction("[1, 2]"),
            Err(StructuringError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_clinical_extraction("not json"),
            Err(StructuringError::JsonParsing(_))
        ));
    }

    #[test]
    fn field_from_bare_value_has_zero_confidence() {
        let field = field_from_value(&serde_json::json!("anxious"));
        assert_eq!(field.value_text().as_deref(), Some("anxious"));
        assert_eq!(field.confidence(), 0.0);
    }

    #[test]
    fn revalidation_answer_decodes() {
        let answer = parse_revalidation_response(
            r#"{"value": "ActiveWithPlan", "confidence": "0.91",
                "criteria": ["stated plan", "access to means"], "reasoning": "Client named a method."}"#,
            "suicidal_ideation",
        )
        .unwrap();
        assert_eq!(answer.value, "ActiveWithPlan");
        assert_eq!(answer.confidence, Some(0.91));
        assert_eq!(answer.criteria, vec!["stated plan", "access to means"]);
        assert_eq!(answer.reasoning.as_deref(), Some("Client named a method."));
    }

    #[test]
    fn revalidation_answer_keyed_by_field_name() {
        let answer = parse_revalidation_response(
            r#"{"homicidal_ideation": {"value": "None", "confidence": 0.88}}"#,
            "homicidal_ideation",
        )
        .unwrap();
        assert_eq!(answer.value, "None");
        assert_eq!(answer.confidence, Some(0.88));
        assert!(answer.criteria.is_empty());
    }

    #[test]
    fn revalidation_answer_without_value_fails() {
        assert!(parse_revalidation_response(r#"{"reasoning": "unsure"}"#, "self_harm").is_err());
        assert!(parse_revalidation_response(r#"{"value": "  "}"#, "self_harm").is_err());
    }
}
