use crate::pipeline::safety::severity::RiskField;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a clinical documentation assistant. Your ONLY role is to convert a
psychotherapy session note into a structured record. You extract and organize
information that is explicitly present in the note.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Extract ONLY information explicitly stated in the note.
2. NEVER add diagnosis, advice, or clinical opinion of your own.
3. If a field is unclear or missing, output null for its value.
4. Every field carries a confidence between 0.0 and 1.0.
5. Quote the supporting sentence in "source" when one exists.
6. Risk fields (suicidal_ideation, homicidal_ideation, self_harm) are ALWAYS
   present. Use "None" only when the note explicitly denies the risk.

OUTPUT FORMAT:
A single JSON object wrapped in ```json``` fences. No prose after the block.
"#;

pub const REVALIDATION_SYSTEM_PROMPT: &str = r#"
You are reviewing one risk-assessment field of a psychotherapy session note.
Read the note independently and decide the field's level from the allowed
values. Do not rely on any earlier reading. Prefer the more severe level when
the note is ambiguous. Answer with a single JSON object and nothing else.
"#;

/// Build the extraction prompt for one session note.
pub fn build_extraction_prompt(session_text: &str, prior_history: Option<&str>) -> String {
    let history_block = match prior_history.map(str::trim).filter(|h| !h.is_empty()) {
        Some(history) => format!(
            "<prior_history>\n{history}\n</prior_history>\n\
             Use prior history only to interpret the note. Extract from the note itself.\n"
        ),
        None => String::new(),
    };

    let levels = |field: RiskField| field.levels().join(" | ");

    format!(
        r#"{history_block}
<session_note>
{session_text}
</session_note>

Extract the session note into the following JSON structure. Each field is an
object {{"value": ..., "confidence": 0.0-1.0, "source": "quoted sentence or null"}}.

```json
{{
  "session_info": {{ "session_date": {{}}, "session_type": {{}}, "duration_minutes": {{}} }},
  "presenting_concerns": {{ "primary_concern": {{}}, "secondary_concerns": {{}} }},
  "mood": {{ "reported_mood": {{}}, "observed_affect": {{}} }},
  "risk_assessment": {{
    "suicidal_ideation": {{ "value": "{si}" }},
    "homicidal_ideation": {{ "value": "{hi}" }},
    "self_harm": {{ "value": "{sh}" }},
    "protective_factors": {{}}
  }},
  "mental_status": {{ "appearance": {{}}, "orientation": {{}}, "thought_process": {{}} }},
  "interventions": {{ "techniques_used": {{}}, "homework_assigned": {{}} }},
  "diagnoses": {{ "primary": {{}}, "secondary": {{}} }},
  "treatment_progress": {{ "progress_summary": {{}}, "goals_addressed": {{}} }},
  "next_steps": {{ "next_session": {{}}, "referrals": {{}} }},
  "metadata": {{ "note_quality": {{}} }}
}}
```"#,
        si = levels(RiskField::SuicidalIdeation),
        hi = levels(RiskField::HomicidalIdeation),
        sh = levels(RiskField::SelfHarm),
    )
}

/// Build the independent second-pass prompt for one risk field.
pub fn build_revalidation_prompt(
    field: RiskField,
    session_text: &str,
    criteria: &[String],
) -> String {
    let criteria_block = if criteria.is_empty() {
        String::new()
    } else {
        format!(
            "Pay particular attention to:\n{}\n",
            criteria
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"<session_note>
{session_text}
</session_note>

Field: {key} ({label})
Allowed values, least to most severe: {levels}
{criteria_block}
Answer with:
{{"value": "<one allowed value>", "confidence": 0.0-1.0, "criteria": ["criterion used", ...], "reasoning": "one or two sentences"}}"#,
        key = field.key(),
        label = field.label(),
        levels = field.levels().join(", "),
    )
}
