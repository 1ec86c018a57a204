use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{now_timestamp, parse_uuid};
use crate::db::repository::risk_decision::list_risk_decisions;
use crate::db::DatabaseError;
use crate::models::enums::ReviewStatus;
use crate::models::{ExtractionResult, PendingReviewView, ReviewStats};

/// Insert the extraction row. Risk decisions are stored separately.
pub fn insert_extraction_result(
    conn: &Connection,
    result: &ExtractionResult,
) -> Result<(), DatabaseError> {
    let reasons_json = serde_json::to_string(&result.review_reasons)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad review_reasons: {e}")))?;
    let extraction_json = serde_json::to_string(&result.extraction)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad extraction payload: {e}")))?;

    conn.execute(
        "INSERT INTO extraction_results
         (id, session_id, schema_version, model_used, overall_confidence, display_confidence,
          requires_review, guardrail_applied,
          suicidal_guardrail_applied, suicidal_guardrail_reason,
          homicidal_guardrail_applied, homicidal_guardrail_reason,
          self_harm_guardrail_applied, self_harm_guardrail_reason,
          criteria_validation_attempts, discrepancy_count,
          review_status, review_reasons, extraction_json, created_at, updated_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?20, ?21)",
        params![
            result.id.to_string(),
            result.session_id,
            result.schema_version,
            result.model_used,
            result.overall_confidence,
            result.display_confidence,
            result.requires_review as i32,
            result.guardrail_applied as i32,
            result.suicidal_guardrail_applied as i32,
            result.suicidal_guardrail_reason,
            result.homicidal_guardrail_applied as i32,
            result.homicidal_guardrail_reason,
            result.self_harm_guardrail_applied as i32,
            result.self_harm_guardrail_reason,
            result.criteria_validation_attempts,
            result.discrepancy_count,
            result.review_status.as_str(),
            reasons_json,
            extraction_json,
            result.created_at,
            result.version,
        ],
    )?;
    Ok(())
}

/// Load one extraction with its risk decisions.
pub fn get_extraction_result(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ExtractionResult>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("{SELECT_EXTRACTION} WHERE id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;

    match row {
        Some(row) => {
            let mut result = extraction_from_row(row)?;
            result.risk_decisions = list_risk_decisions(conn, &result.id)?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

/// Current review status and version, or `None` for an unknown id.
pub fn get_review_state(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<(ReviewStatus, i64)>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT review_status, version FROM extraction_results WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    match row {
        Some((status, version)) => Ok(Some((ReviewStatus::from_str(&status)?, version))),
        None => Ok(None),
    }
}

/// Compare-and-set the review status. Returns the number of rows changed:
/// 0 means the version moved since it was read.
pub fn update_review_status(
    conn: &Connection,
    id: &Uuid,
    status: ReviewStatus,
    expected_version: i64,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE extraction_results
         SET review_status = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4",
        params![status.as_str(), now_timestamp(), id.to_string(), expected_version],
    )?;
    Ok(changed)
}

/// Extractions awaiting a supervisor, oldest first.
pub fn list_pending_reviews(conn: &Connection) -> Result<Vec<PendingReviewView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, overall_confidence, guardrail_applied, discrepancy_count,
                review_reasons, created_at, version
         FROM extraction_results
         WHERE review_status = 'pending'
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, u32>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })?;

    let mut views = Vec::new();
    for row in rows {
        let (id, session_id, confidence, guardrail, discrepancies, reasons, created_at, version) =
            row?;
        views.push(PendingReviewView {
            extraction_id: parse_uuid(&id)?,
            session_id,
            overall_confidence: confidence,
            guardrail_applied: guardrail != 0,
            discrepancy_count: discrepancies,
            review_reasons: parse_reasons(&reasons)?,
            created_at,
            version,
        });
    }
    Ok(views)
}

/// Extraction counts per review status.
pub fn count_by_status(conn: &Connection) -> Result<ReviewStats, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT review_status, COUNT(*) FROM extraction_results GROUP BY review_status",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut stats = ReviewStats::default();
    for row in rows {
        let (status, count) = row?;
        stats.add(ReviewStatus::from_str(&status)?, count);
    }
    Ok(stats)
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

const SELECT_EXTRACTION: &str = "SELECT id, session_id, schema_version, model_used,
        overall_confidence, display_confidence, requires_review, guardrail_applied,
        suicidal_guardrail_applied, suicidal_guardrail_reason,
        homicidal_guardrail_applied, homicidal_guardrail_reason,
        self_harm_guardrail_applied, self_harm_guardrail_reason,
        criteria_validation_attempts, discrepancy_count,
        review_status, review_reasons, extraction_json, created_at, version
 FROM extraction_results";

struct ExtractionRow {
    id: String,
    session_id: String,
    schema_version: String,
    model_used: String,
    overall_confidence: f64,
    display_confidence: Option<f64>,
    requires_review: i32,
    guardrail_applied: i32,
    suicidal_applied: i32,
    suicidal_reason: Option<String>,
    homicidal_applied: i32,
    homicidal_reason: Option<String>,
    self_harm_applied: i32,
    self_harm_reason: Option<String>,
    criteria_validation_attempts: u32,
    discrepancy_count: u32,
    review_status: String,
    review_reasons: String,
    extraction_json: String,
    created_at: String,
    version: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExtractionRow> {
    Ok(ExtractionRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        schema_version: row.get(2)?,
        model_used: row.get(3)?,
        overall_confidence: row.get(4)?,
        display_confidence: row.get(5)?,
        requires_review: row.get(6)?,
        guardrail_applied: row.get(7)?,
        suicidal_applied: row.get(8)?,
        suicidal_reason: row.get(9)?,
        homicidal_applied: row.get(10)?,
        homicidal_reason: row.get(11)?,
        self_harm_applied: row.get(12)?,
        self_harm_reason: row.get(13)?,
        criteria_validation_attempts: row.get(14)?,
        discrepancy_count: row.get(15)?,
        review_status: row.get(16)?,
        review_reasons: row.get(17)?,
        extraction_json: row.get(18)?,
        created_at: row.get(19)?,
        version: row.get(20)?,
    })
}

fn extraction_from_row(row: ExtractionRow) -> Result<ExtractionResult, DatabaseError> {
    let extraction = serde_json::from_str(&row.extraction_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad extraction_json: {e}")))?;

    Ok(ExtractionResult {
        id: parse_uuid(&row.id)?,
        session_id: row.session_id,
        schema_version: row.schema_version,
        model_used: row.model_used,
        overall_confidence: row.overall_confidence,
        display_confidence: row.display_confidence,
        requires_review: row.requires_review != 0,
        guardrail_applied: row.guardrail_applied != 0,
        suicidal_guardrail_applied: row.suicidal_applied != 0,
        suicidal_guardrail_reason: row.suicidal_reason,
        homicidal_guardrail_applied: row.homicidal_applied != 0,
        homicidal_guardrail_reason: row.homicidal_reason,
        self_harm_guardrail_applied: row.self_harm_applied != 0,
        self_harm_guardrail_reason: row.self_harm_reason,
        criteria_validation_attempts: row.criteria_validation_attempts,
        discrepancy_count: row.discrepancy_count,
        risk_decisions: Vec::new(),
        review_status: ReviewStatus::from_str(&row.review_status)?,
        review_reasons: parse_reasons(&row.review_reasons)?,
        extraction,
        created_at: row.created_at,
        version: row.version,
    })
}

fn parse_reasons(raw: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad review_reasons JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::extraction::tests_support::sample_result;
    use crate::pipeline::structuring::types::ExtractedField;

    fn pending(confidence: f64) -> ExtractionResult {
        let mut r = sample_result(confidence);
        r.requires_review = true;
        r.review_status = ReviewStatus::Pending;
        r.review_reasons = vec![format!("Low confidence ({confidence:.2})")];
        r
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = open_memory_database().unwrap();
        let mut result = pending(0.55);
        result.homicidal_guardrail_applied = true;
        result.homicidal_guardrail_reason = Some("explicit_threats".into());
        result.guardrail_applied = true;
        result.display_confidence = Some(0.8);
        result
            .extraction
            .mood
            .insert("reported_mood".into(), ExtractedField::new(Some(json!("low")), 0.8, None));
        insert_extraction_result(&conn, &result).unwrap();

        let loaded = get_extraction_result(&conn, &result.id).unwrap().unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn get_unknown_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_extraction_result(&conn, &Uuid::new_v4()).unwrap().is_none());
        assert!(get_review_state(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn update_review_status_checks_version() {
        let conn = open_memory_database().unwrap();
        let result = pending(0.5);
        insert_extraction_result(&conn, &result).unwrap();

        assert_eq!(update_review_status(&conn, &result.id, ReviewStatus::Approved, 1).unwrap(), 1);
        assert_eq!(update_review_status(&conn, &result.id, ReviewStatus::Dismissed, 1).unwrap(), 0);

        let (status, version) = get_review_state(&conn, &result.id).unwrap().unwrap();
        assert_eq!(status, ReviewStatus::Approved);
        assert_eq!(version, 2);
    }

    #[test]
    fn pending_queue_lists_only_pending() {
        let conn = open_memory_database().unwrap();
        let flagged = pending(0.4);
        insert_extraction_result(&conn, &flagged).unwrap();
        insert_extraction_result(&conn, &sample_result(0.95)).unwrap();

        let queue = list_pending_reviews(&conn).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].extraction_id, flagged.id);
        assert_eq!(queue[0].review_reasons, vec!["Low confidence (0.40)".to_string()]);
    }

    #[test]
    fn stats_count_each_status() {
        let conn = open_memory_database().unwrap();
        insert_extraction_result(&conn, &pending(0.4)).unwrap();
        insert_extraction_result(&conn, &pending(0.6)).unwrap();
        insert_extraction_result(&conn, &sample_result(0.9)).unwrap();

        let stats = count_by_status(&conn).unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.not_flagged, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn out_of_range_confidence_rejected_by_schema() {
        let conn = open_memory_database().unwrap();
        let bad = sample_result(1.5);
        assert!(insert_extraction_result(&conn, &bad).is_err());
    }
}
