//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection` so callers choose the
//! transaction boundary.

mod extraction;
mod risk_decision;
mod supervisor_review;

pub use extraction::*;
pub use risk_decision::*;
pub use supervisor_review::*;

use chrono::Utc;

/// Timestamp format shared by every table.
pub(crate) fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, super::DatabaseError> {
    uuid::Uuid::parse_str(raw).map_err(|e| super::DatabaseError::ConstraintViolation(e.to_string()))
}
