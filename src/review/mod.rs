//! Supervisor review: routing at extraction time, submissions afterwards,
//! and the read projections over both.
//!
//! State machine: NotFlagged → Pending → {Approved, Dismissed}. The
//! pipeline assigns the first two; reviewers can only submit the last two.
//! Every submission appends a `SupervisorReview` and moves `review_status`
//! in the same transaction.

pub mod routing;
pub mod store;

pub use routing::*;
pub use store::*;

use std::str::FromStr;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{ReviewAction, ReviewStatus};
use crate::models::{ExtractionDiagnostics, PendingReviewView, ReviewStats, SupervisorReview};
use crate::pipeline::safety::types::RiskFieldDecision;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Invalid review submission: {0}")]
    Validation(String),

    #[error("Extraction not found: {0}")]
    NotFound(Uuid),

    #[error(
        "Review of extraction {extraction_id} conflicted with another submission \
         (expected version {expected:?}, found {actual:?}); re-fetch the current status and retry"
    )]
    ConcurrencyConflict {
        extraction_id: Uuid,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Parse a reviewer-supplied action. System-assigned states are rejected.
pub fn parse_review_action(raw: &str) -> Result<ReviewAction, ReviewError> {
    let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    if let Ok(status) = ReviewStatus::from_str(&normalized) {
        if !status.is_terminal() {
            return Err(ReviewError::Validation(format!(
                "'{}' is assigned by the pipeline and cannot be submitted",
                status.as_str()
            )));
        }
    }
    ReviewAction::from_str(&normalized)
        .map_err(|_| ReviewError::Validation(format!("unknown review action '{}'", raw.trim())))
}

fn validate_submission(
    extraction_id: &Uuid,
    action: ReviewAction,
    reviewer_name: &str,
    notes: Option<&str>,
) -> Result<ReviewSubmission, ReviewError> {
    let reviewer_name = reviewer_name.trim();
    if reviewer_name.is_empty() {
        return Err(ReviewError::Validation("reviewer name is required".into()));
    }
    Ok(ReviewSubmission {
        extraction_id: *extraction_id,
        action,
        reviewer_name: reviewer_name.to_string(),
        notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
    })
}

/// Record a supervisor decision.
///
/// Concurrent submissions for one extraction are serialized: both are
/// accepted in commit order, the last commit owns `review_status`, and
/// both stay in history.
pub fn submit_review(
    conn: &Connection,
    store: &dyn ExtractionStore,
    extraction_id: &Uuid,
    action: ReviewAction,
    reviewer_name: &str,
    notes: Option<&str>,
) -> Result<SupervisorReview, ReviewError> {
    let submission = validate_submission(extraction_id, action, reviewer_name, notes)?;
    let review = store.record_review(conn, &submission, None)?;
    tracing::info!(
        extraction_id = %extraction_id,
        action = action.as_str(),
        seq = review.seq,
        "Supervisor review recorded"
    );
    Ok(review)
}

/// First-writer-wins variant: fails with `ConcurrencyConflict` when the
/// extraction moved past `expected_version`.
pub fn submit_review_at_version(
    conn: &Connection,
    store: &dyn ExtractionStore,
    extraction_id: &Uuid,
    action: ReviewAction,
    reviewer_name: &str,
    notes: Option<&str>,
    expected_version: i64,
) -> Result<SupervisorReview, ReviewError> {
    let submission = validate_submission(extraction_id, action, reviewer_name, notes)?;
    let result = store.record_review(conn, &submission, Some(expected_version));
    match &result {
        Ok(review) => tracing::info!(
            extraction_id = %extraction_id,
            action = action.as_str(),
            seq = review.seq,
            "Supervisor review recorded"
        ),
        Err(ReviewError::ConcurrencyConflict { actual, .. }) => tracing::warn!(
            extraction_id = %extraction_id,
            expected = expected_version,
            actual = ?actual,
            "Stale review submission rejected"
        ),
        Err(_) => {}
    }
    result
}

// ═══════════════════════════════════════════
// Read projections
// ═══════════════════════════════════════════

pub fn get_pending_reviews(
    conn: &Connection,
    store: &dyn ExtractionStore,
) -> Result<Vec<PendingReviewView>, ReviewError> {
    Ok(store.pending_reviews(conn)?)
}

pub fn get_review_stats(
    conn: &Connection,
    store: &dyn ExtractionStore,
) -> Result<ReviewStats, ReviewError> {
    Ok(store.review_stats(conn)?)
}

/// Guardrail diagnostics for one extraction; `None` when reconciliation
/// never ran.
pub fn get_diagnostics(
    conn: &Connection,
    store: &dyn ExtractionStore,
    extraction_id: &Uuid,
) -> Result<Option<ExtractionDiagnostics>, ReviewError> {
    let result = store
        .load_result(conn, extraction_id)?
        .ok_or(ReviewError::NotFound(*extraction_id))?;
    Ok(result.diagnostics())
}

pub fn list_reviews(
    conn: &Connection,
    store: &dyn ExtractionStore,
    extraction_id: &Uuid,
) -> Result<Vec<SupervisorReview>, ReviewError> {
    Ok(store.review_history(conn, extraction_id)?)
}

pub fn list_risk_decisions(
    conn: &Connection,
    store: &dyn ExtractionStore,
    extraction_id: &Uuid,
) -> Result<Vec<RiskFieldDecision>, ReviewError> {
    Ok(store.risk_decisions(conn, extraction_id)?)
}
