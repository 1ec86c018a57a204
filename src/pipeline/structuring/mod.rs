pub mod types;
pub mod scalar;
pub mod parser;
pub mod sanitize;
pub mod confidence;
pub mod prompt;
pub mod ollama;
pub mod orchestrator;
pub mod batch;

pub use types::*;
pub use scalar::*;
pub use parser::*;
pub use sanitize::*;
pub use confidence::*;
pub use prompt::*;
pub use ollama::*;
pub use orchestrator::*;
pub use batch::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("LLM call cancelled")]
    Cancelled,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Session note too short for extraction (< {0} characters)")]
    InputTooShort(usize),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),

    #[error("Persistence error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
