use rusqlite::{params, Connection};
use uuid::Uuid;

use super::now_timestamp;
use crate::db::DatabaseError;
use crate::pipeline::safety::types::RiskFieldDecision;

/// Append the guardrail decisions for one extraction. Never updates.
pub fn insert_risk_decisions(
    conn: &Connection,
    extraction_id: &Uuid,
    decisions: &[RiskFieldDecision],
) -> Result<(), DatabaseError> {
    if decisions.is_empty() {
        return Ok(());
    }
    let now = now_timestamp();
    let mut stmt = conn.prepare(
        "INSERT INTO risk_field_decisions
         (extraction_id, field, original_value, re_extracted_value, final_value,
          rule_applied, criteria_used, reasoning_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for d in decisions {
        let criteria_json = serde_json::to_string(&d.criteria_used)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad criteria_used: {e}")))?;
        stmt.execute(params![
            extraction_id.to_string(),
            d.field,
            d.original_value,
            d.re_extracted_value,
            d.final_value,
            d.rule_applied,
            criteria_json,
            d.reasoning_used,
            now,
        ])?;
    }
    Ok(())
}

/// Decisions for one extraction in insertion order.
pub fn list_risk_decisions(
    conn: &Connection,
    extraction_id: &Uuid,
) -> Result<Vec<RiskFieldDecision>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT field, original_value, re_extracted_value, final_value,
                rule_applied, criteria_used, reasoning_used
         FROM risk_field_decisions
         WHERE extraction_id = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![extraction_id.to_string()], |row| {
        Ok((
            RiskFieldDecision {
                field: row.get(0)?,
                original_value: row.get(1)?,
                re_extracted_value: row.get(2)?,
                final_value: row.get(3)?,
                rule_applied: row.get(4)?,
                criteria_used: Vec::new(),
                reasoning_used: row.get(6)?,
            },
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut decisions = Vec::new();
    for row in rows {
        let (mut decision, criteria_json) = row?;
        decision.criteria_used = serde_json::from_str(&criteria_json).map_err(|e| {
            DatabaseError::ConstraintViolation(format!("Bad criteria_used JSON: {e}"))
        })?;
        decisions.push(decision);
    }
    Ok(decisions)
}
