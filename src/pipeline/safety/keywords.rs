use std::sync::LazyLock;

use regex::Regex;

use super::severity::RiskField;
use super::types::GuardrailReason;

/// A compiled risk pattern with its trigger metadata.
struct RiskPattern {
    regex: Regex,
    field: RiskField,
    reason: GuardrailReason,
    description: &'static str,
}

/// A risk keyword found in the session text.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub field: RiskField,
    pub reason: GuardrailReason,
    /// Human-readable criterion, recorded in the audit trail.
    pub description: &'static str,
}

/// Suicidal ideation language.
static SUICIDAL_PATTERNS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\bsuicid(?:e|al|ality)\b",
            RiskField::SuicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Explicit mention: 'suicide/suicidal'",
        ),
        pattern(
            r"(?i)\bkill(?:ing)?\s+myself\b",
            RiskField::SuicidalIdeation,
            GuardrailReason::KeywordPresent,
            "First-person statement: 'kill myself'",
        ),
        pattern(
            r"(?i)\b(?:want(?:s|ed)?|wish(?:es|ed)?)\s+(?:I\s+(?:was|were)\s+dead|to\s+die)\b",
            RiskField::SuicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Death wish: 'want to die'",
        ),
        pattern(
            r"(?i)\b(?:end(?:ing)?\s+(?:my\s+life|it\s+all)|better\s+off\s+dead|no\s+reason\s+to\s+live)\b",
            RiskField::SuicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Hopelessness phrasing: 'end it all/better off dead'",
        ),
        pattern(
            r"(?i)\b(?:not\s+wak(?:e|ing)\s+up|overdos(?:e|ing))\b",
            RiskField::SuicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Passive or method reference: 'not waking up/overdose'",
        ),
    ]
});

/// Homicidal ideation language. Direct threats carry their own reason.
static HOMICIDAL_PATTERNS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\b(?:kill|murder|shoot|stab|strangle)\s+(?:him|her|them|you|my\s+\w+|the\s+\w+)\b",
            RiskField::HomicidalIdeation,
            GuardrailReason::ExplicitThreats,
            "Direct threat: 'kill/shoot/stab [person]'",
        ),
        pattern(
            r"(?i)\b(?:going\s+to|gonna|will)\s+(?:hurt|kill|get)\s+(?:him|her|them|you)\b",
            RiskField::HomicidalIdeation,
            GuardrailReason::ExplicitThreats,
            "Stated intent: 'going to hurt [person]'",
        ),
        pattern(
            r"(?i)\bhomicid(?:e|al)\b",
            RiskField::HomicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Explicit mention: 'homicide/homicidal'",
        ),
        pattern(
            r"(?i)\b(?:revenge|get\s+back\s+at|make\s+(?:him|her|them)\s+pay)\b",
            RiskField::HomicidalIdeation,
            GuardrailReason::KeywordPresent,
            "Retaliation language: 'revenge/make them pay'",
        ),
    ]
});

/// Self-harm language.
static SELF_HARM_PATTERNS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\bself[-\s]?(?:harm(?:ing)?|injur(?:y|ies|ing))\b",
            RiskField::SelfHarm,
            GuardrailReason::KeywordPresent,
            "Explicit mention: 'self-harm/self-injury'",
        ),
        pattern(
            r"(?i)\b(?:cut(?:ting)?|burn(?:ing|ed)?|hurt(?:ing)?|scratch(?:ing|ed)?)\s+(?:myself|herself|himself|themselves)\b",
            RiskField::SelfHarm,
            GuardrailReason::KeywordPresent,
            "Self-directed injury: 'cut/burn/hurt myself'",
        ),
        pattern(
            r"(?i)\bcutting\b",
            RiskField::SelfHarm,
            GuardrailReason::KeywordPresent,
            "Behaviour mention: 'cutting'",
        ),
    ]
});

fn pattern(
    regex_str: &str,
    field: RiskField,
    reason: GuardrailReason,
    description: &'static str,
) -> RiskPattern {
    RiskPattern {
        regex: Regex::new(regex_str).expect("valid regex"),
        field,
        reason,
        description,
    }
}

/// Scan session text for risk language. One hit per matching pattern,
/// in field order (suicidal, homicidal, self-harm).
pub fn detect_risk_keywords(text: &str) -> Vec<KeywordHit> {
    SUICIDAL_PATTERNS
        .iter()
        .chain(HOMICIDAL_PATTERNS.iter())
        .chain(SELF_HARM_PATTERNS.iter())
        .filter(|p| p.regex.is_match(text))
        .map(|p| KeywordHit {
            field: p.field,
            reason: p.reason,
            description: p.description,
        })
        .collect()
}
