//! Model output cleanup that runs before JSON normalization.
//!
//! Strips reasoning blocks (`<think>...</think>`, Gemma `<unusedN>thought`)
//! and stray special tokens so the normalizer only sees the answer.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

/// Strip model-specific artifacts from raw LLM output.
pub fn sanitize_llm_output(raw: &str) -> String {
    let mut text = THINK_BLOCK_RE.replace_all(raw, "").into_owned();

    // Gemma thinking prefix: <unusedN>thought\n ... (answer follows)
    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + "thought\n".len()..].to_string();
        }
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").into_owned();
    text.trim().to_string()
}
