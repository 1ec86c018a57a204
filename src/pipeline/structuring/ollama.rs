use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::prompt::REVALIDATION_SYSTEM_PROMPT;
use super::types::LlmClient;
use super::StructuringError;
use crate::config::PipelineConfig;
use crate::pipeline::safety::severity::RiskField;

/// How often a bounded call wakes up to check the cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client pointing at an Ollama instance.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, StructuringError> {
        Self::new(&config.ollama_base_url, config.llm_timeout_secs)
    }

    fn transport_error(&self, e: reqwest::Error) -> StructuringError {
        if e.is_connect() {
            StructuringError::OllamaConnection(self.base_url.clone())
        } else if e.is_timeout() {
            StructuringError::Timeout(Duration::from_secs(self.timeout_secs))
        } else {
            StructuringError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

// ═══════════════════════════════════════════
// Bounded invocation
// ═══════════════════════════════════════════

/// Run one `generate` call on a worker thread and wait at most `timeout`.
///
/// Returns `Timeout` when the deadline passes and `Cancelled` as soon as the
/// flag is raised. An abandoned worker finishes in the background and its
/// answer is dropped.
pub fn generate_bounded(
    llm: &Arc<dyn LlmClient>,
    model: &str,
    prompt: &str,
    system: &str,
    timeout: Duration,
    cancel: Option<&AtomicBool>,
) -> Result<String, StructuringError> {
    let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::SeqCst));
    if is_cancelled() {
        return Err(StructuringError::Cancelled);
    }

    let (tx, rx) = mpsc::channel();
    let worker_llm = Arc::clone(llm);
    let (model, prompt, system) = (model.to_string(), prompt.to_string(), system.to_string());
    std::thread::Builder::new()
        .name("llm-call".into())
        .spawn(move || {
            // Receiver may be gone after a timeout; nothing to do then.
            let _ = tx.send(worker_llm.generate(&model, &prompt, &system));
        })
        .map_err(|e| StructuringError::HttpClient(format!("failed to spawn LLM worker: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(StructuringError::Timeout(timeout));
        }
        match rx.recv_timeout((deadline - now).min(CANCEL_POLL_INTERVAL)) {
            Ok(result) => return result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if is_cancelled() {
                    return Err(StructuringError::Cancelled);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(StructuringError::HttpClient(
                    "LLM worker exited without a response".into(),
                ))
            }
        }
    }
}

// ═══════════════════════════════════════════
// Mock client
// ═══════════════════════════════════════════

/// Scripted behaviour for one kind of mock call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
    /// Sleep, then answer. Used to exercise timeouts.
    Delay(Duration, String),
}

impl MockReply {
    fn play(&self) -> Result<String, StructuringError> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Fail(message) => Err(StructuringError::HttpClient(message.clone())),
            Self::Delay(wait, text) => {
                std::thread::sleep(*wait);
                Ok(text.clone())
            }
        }
    }
}

/// Mock LLM client for testing. Extraction calls get the primary reply;
/// re-validation calls get the reply scripted for the field being checked.
pub struct MockLlmClient {
    primary: MockReply,
    revalidations: HashMap<RiskField, MockReply>,
    calls: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            primary: MockReply::Text(response.to_string()),
            revalidations: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            primary: MockReply::Fail(message.to_string()),
            ..Self::new("")
        }
    }

    pub fn with_revalidation(self, field: RiskField, response: &str) -> Self {
        self.with_revalidation_reply(field, MockReply::Text(response.to_string()))
    }

    pub fn with_revalidation_reply(mut self, field: RiskField, reply: MockReply) -> Self {
        self.revalidations.insert(field, reply);
        self
    }

    /// Model names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn field_in_prompt(prompt: &str) -> Option<RiskField> {
        RiskField::all()
            .iter()
            .copied()
            .find(|f| prompt.contains(&format!("Field: {} (", f.key())))
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }
        if system != REVALIDATION_SYSTEM_PROMPT {
            return self.primary.play();
        }
        match Self::field_in_prompt(prompt).and_then(|f| self.revalidations.get(&f)) {
            Some(reply) => reply.play(),
            None => Err(StructuringError::HttpClient("no scripted re-validation".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::prompt::build_revalidation_prompt;

    fn shared(client: MockLlmClient) -> Arc<dyn LlmClient> {
        Arc::new(client)
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        let result = client.generate("model", "prompt", "system").unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.calls(), vec!["model".to_string()]);
    }

    #[test]
    fn mock_routes_revalidation_by_field() {
        let client = MockLlmClient::new("{}")
            .with_revalidation(RiskField::SelfHarm, r#"{"value":"Recent"}"#);
        let prompt = build_revalidation_prompt(RiskField::SelfHarm, "note", &[]);
        let answer = client
            .generate("m", &prompt, REVALIDATION_SYSTEM_PROMPT)
            .unwrap();
        assert_eq!(answer, r#"{"value":"Recent"}"#);

        let other = build_revalidation_prompt(RiskField::SuicidalIdeation, "note", &[]);
        assert!(client.generate("m", &other, REVALIDATION_SYSTEM_PROMPT).is_err());
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
    }

    #[test]
    fn ollama_client_from_config() {
        let config = PipelineConfig::default();
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 120);
    }

    #[test]
    fn bounded_call_returns_answer() {
        let llm = shared(MockLlmClient::new("ok"));
        let out = generate_bounded(&llm, "m", "p", "s", Duration::from_secs(5), None).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn bounded_call_times_out() {
        let llm = shared(MockLlmClient {
            primary: MockReply::Delay(Duration::from_millis(500), "late".into()),
            ..MockLlmClient::new("")
        });
        let err = generate_bounded(&llm, "m", "p", "s", Duration::from_millis(50), None)
            .unwrap_err();
        assert!(matches!(err, StructuringError::Timeout(_)));
    }

    #[test]
    fn bounded_call_honours_cancel_flag() {
        let llm = shared(MockLlmClient::new("ok"));
        let cancel = AtomicBool::new(true);
        let err = generate_bounded(&llm, "m", "p", "s", Duration::from_secs(5), Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, StructuringError::Cancelled));
    }

    #[test]
    fn bounded_call_cancels_in_flight() {
        let llm = shared(MockLlmClient {
            primary: MockReply::Delay(Duration::from_secs(2), "late".into()),
            ..MockLlmClient::new("")
        });
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });
        let started = Instant::now();
        let err = generate_bounded(&llm, "m", "p", "s", Duration::from_secs(10), Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, StructuringError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn bounded_call_propagates_client_error() {
        let llm = shared(MockLlmClient::failing("boom"));
        let err = generate_bounded(&llm, "m", "p", "s", Duration::from_secs(5), None)
            .unwrap_err();
        assert!(matches!(err, StructuringError::HttpClient(ref m) if m == "boom"));
    }
}
