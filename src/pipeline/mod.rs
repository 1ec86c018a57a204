pub mod model_router; // Task → model lookup
pub mod structuring; // Extraction, normalization, confidence
pub mod safety; // Risk guardrail and conservative merge
