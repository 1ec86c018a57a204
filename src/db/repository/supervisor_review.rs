use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{now_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ReviewAction;
use crate::models::SupervisorReview;

/// Append one supervisor review and return it with its commit sequence.
pub fn insert_supervisor_review(
    conn: &Connection,
    extraction_id: &Uuid,
    action: ReviewAction,
    reviewer_name: &str,
    notes: Option<&str>,
) -> Result<SupervisorReview, DatabaseError> {
    let id = Uuid::new_v4();
    let reviewed_at = now_timestamp();

    conn.execute(
        "INSERT INTO supervisor_reviews (id, extraction_id, action, reviewer_name, notes, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            extraction_id.to_string(),
            action.as_str(),
            reviewer_name,
            notes,
            reviewed_at,
        ],
    )?;

    Ok(SupervisorReview {
        id,
        extraction_id: *extraction_id,
        seq: conn.last_insert_rowid(),
        action,
        reviewer_name: reviewer_name.to_string(),
        notes: notes.map(str::to_string),
        reviewed_at,
    })
}

/// Full review history for one extraction in commit order.
pub fn list_supervisor_reviews(
    conn: &Connection,
    extraction_id: &Uuid,
) -> Result<Vec<SupervisorReview>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, extraction_id, action, reviewer_name, notes, reviewed_at
         FROM supervisor_reviews
         WHERE extraction_id = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![extraction_id.to_string()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut reviews = Vec::new();
    for row in rows {
        let (seq, id, extraction_id, action, reviewer_name, notes, reviewed_at) = row?;
        reviews.push(SupervisorReview {
            id: parse_uuid(&id)?,
            extraction_id: parse_uuid(&extraction_id)?,
            seq,
            action: ReviewAction::from_str(&action)?,
            reviewer_name,
            notes,
            reviewed_at,
        });
    }
    Ok(reviews)
}
