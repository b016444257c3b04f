//! Cursor state store: last-known cursor position per (user, project).
//!
//! Cursor position is a best-effort presence signal, not durable state of
//! record. The upsert and the subsequent broadcast are independent — a
//! persistence failure is logged and the relay still runs.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::models::CursorPosition;
use crate::db::DbPool;

/// Upsert the row for (user, project). One row per pair is the invariant;
/// only the latest write matters, so out-of-order writes are acceptable.
pub fn upsert_position(
    conn: &Connection,
    user_id: i64,
    project_id: i64,
    x: f64,
    y: f64,
) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cursor_positions (user_id, project_id, position_x, position_y, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, project_id)
         DO UPDATE SET position_x = ?3, position_y = ?4, last_updated = ?5",
        params![user_id, project_id, x, y, now],
    )?;
    Ok(())
}

/// Last-known positions for every user in a project.
pub fn positions_for_project(
    conn: &Connection,
    project_id: i64,
) -> rusqlite::Result<Vec<CursorPosition>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, project_id, position_x, position_y, last_updated
         FROM cursor_positions WHERE project_id = ?1",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok(CursorPosition {
            user_id: row.get(0)?,
            project_id: row.get(1)?,
            position_x: row.get(2)?,
            position_y: row.get(3)?,
            last_updated: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Async wrapper used on the socket path: spawn_blocking upsert, logging
/// any failure instead of propagating it. Frames without both coordinates
/// skip the write (nothing useful to store) but are still relayed.
pub async fn persist_position(
    db: &DbPool,
    user_id: i64,
    project_id: i64,
    x: Option<f64>,
    y: Option<f64>,
) {
    let (Some(x), Some(y)) = (x, y) else {
        return;
    };

    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| format!("DB lock error: {}", e))?;
        upsert_position(&conn, user_id, project_id, x, y).map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(user_id, project_id, error = %e, "Cursor upsert failed");
        }
        Err(e) => {
            tracing::warn!(user_id, project_id, error = %e, "Cursor upsert task failed");
        }
    }
}
