use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ReviewAction;

/// One supervisor decision. Append-only: a later review adds a new record
/// and never edits an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorReview {
    pub id: Uuid,
    pub extraction_id: Uuid,
    /// Commit order across all reviews.
    pub seq: i64,
    pub action: ReviewAction,
    pub reviewer_name: String,
    pub notes: Option<String>,
    pub reviewed_at: String,
}
