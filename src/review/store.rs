use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::ReviewError;
use crate::db::repository::{
    count_by_status, get_extraction_result, get_review_state, insert_extraction_result,
    insert_risk_decisions, insert_supervisor_review, list_pending_reviews, list_risk_decisions,
    list_supervisor_reviews, update_review_status,
};
use crate::db::DatabaseError;
use crate::models::enums::ReviewAction;
use crate::models::{ExtractionResult, PendingReviewView, ReviewStats, SupervisorReview};
use crate::pipeline::safety::types::RiskFieldDecision;

/// A validated supervisor submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    pub extraction_id: Uuid,
    pub action: ReviewAction,
    pub reviewer_name: String,
    pub notes: Option<String>,
}

/// Persistence for extraction results and their review trail (allows mocking).
pub trait ExtractionStore: Send + Sync {
    /// Store a result and its risk decisions atomically.
    fn save_result(&self, conn: &Connection, result: &ExtractionResult) -> Result<(), DatabaseError>;

    fn load_result(
        &self,
        conn: &Connection,
        id: &Uuid,
    ) -> Result<Option<ExtractionResult>, DatabaseError>;

    /// Append a review and move `review_status` in one serialized step.
    /// With `expected_version`, a stale version is rejected and nothing is
    /// written.
    fn record_review(
        &self,
        conn: &Connection,
        submission: &ReviewSubmission,
        expected_version: Option<i64>,
    ) -> Result<SupervisorReview, ReviewError>;

    fn pending_reviews(&self, conn: &Connection) -> Result<Vec<PendingReviewView>, DatabaseError>;

    fn review_stats(&self, conn: &Connection) -> Result<ReviewStats, DatabaseError>;

    fn review_history(
        &self,
        conn: &Connection,
        extraction_id: &Uuid,
    ) -> Result<Vec<SupervisorReview>, DatabaseError>;

    fn risk_decisions(
        &self,
        conn: &Connection,
        extraction_id: &Uuid,
    ) -> Result<Vec<RiskFieldDecision>, DatabaseError>;
}

/// SQLite-backed extraction store.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteExtractionStore;

impl SqliteExtractionStore {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionStore for SqliteExtractionStore {
    fn save_result(&self, conn: &Connection, result: &ExtractionResult) -> Result<(), DatabaseError> {
        let tx = conn.unchecked_transaction()?;
        insert_extraction_result(&tx, result)?;
        insert_risk_decisions(&tx, &result.id, &result.risk_decisions)?;
        tx.commit()?;
        Ok(())
    }

    fn load_result(
        &self,
        conn: &Connection,
        id: &Uuid,
    ) -> Result<Option<ExtractionResult>, DatabaseError> {
        get_extraction_result(conn, id)
    }

    fn record_review(
        &self,
        conn: &Connection,
        submission: &ReviewSubmission,
        expected_version: Option<i64>,
    ) -> Result<SupervisorReview, ReviewError> {
        let id = submission.extraction_id;
        let conflict = |expected: Option<i64>, actual: Option<i64>| ReviewError::ConcurrencyConflict {
            extraction_id: id,
            expected,
            actual,
        };
        let db_error = |e: DatabaseError| {
            if e.is_busy() {
                conflict(expected_version, None)
            } else {
                ReviewError::Database(e)
            }
        };

        // IMMEDIATE takes the write lock up front, so the read below cannot
        // go stale before the update.
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|e| db_error(e.into()))?;

        let (_, version) = get_review_state(&tx, &id)
            .map_err(db_error)?
            .ok_or(ReviewError::NotFound(id))?;

        if let Some(expected) = expected_version {
            if expected != version {
                return Err(conflict(Some(expected), Some(version)));
            }
        }

        let review = insert_supervisor_review(
            &tx,
            &id,
            submission.action,
            &submission.reviewer_name,
            submission.notes.as_deref(),
        )
        .map_err(db_error)?;

        let changed = update_review_status(&tx, &id, submission.action.into(), version)
            .map_err(db_error)?;
        if changed == 0 {
            return Err(conflict(Some(version), None));
        }

        tx.commit().map_err(|e| db_error(e.into()))?;
        Ok(review)
    }

    fn pending_reviews(&self, conn: &Connection) -> Result<Vec<PendingReviewView>, DatabaseError> {
        list_pending_reviews(conn)
    }

    fn review_stats(&self, conn: &Connection) -> Result<ReviewStats, DatabaseError> {
        count_by_status(conn)
    }

    fn review_history(
        &self,
        conn: &Connection,
        extraction_id: &Uuid,
    ) -> Result<Vec<SupervisorReview>, DatabaseError> {
        list_supervisor_reviews(conn, extraction_id)
    }

    fn risk_decisions(
        &self,
        conn: &Connection,
        extraction_id: &Uuid,
    ) -> Result<Vec<RiskFieldDecision>, DatabaseError> {
        list_risk_decisions(conn, extraction_id)
    }
}
