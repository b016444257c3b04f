//! Plain insert/query helpers over the planning tables.
//!
//! The CRUD REST layer owns these entities; the collaboration core only
//! needs primary-key reach into them. All helpers take a &Connection so
//! callers decide the locking scope (lock the pool once per operation).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Notification, SubjectKind, Subtask, Task};

pub fn create_user(conn: &Connection, username: &str) -> rusqlite::Result<i64> {
    conn.execute("INSERT INTO users (username) VALUES (?1)", params![username])?;
    Ok(conn.last_insert_rowid())
}

pub fn create_team(conn: &Connection, name: &str, description: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO teams (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Idempotent membership insert; the notification for a membership
/// addition is the service layer's concern.
pub fn add_team_member(conn: &Connection, team_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?1, ?2)",
        params![team_id, user_id],
    )?;
    Ok(())
}

pub fn create_project(conn: &Connection, name: &str, description: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO projects (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn attach_team(conn: &Connection, project_id: i64, team_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO project_teams (project_id, team_id) VALUES (?1, ?2)",
        params![project_id, team_id],
    )?;
    Ok(())
}

pub fn create_goal(
    conn: &Connection,
    project_id: i64,
    title: &str,
    description: &str,
    status: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO goals (project_id, title, description, status) VALUES (?1, ?2, ?3, ?4)",
        params![project_id, title, description, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_subgoal(
    conn: &Connection,
    goal_id: i64,
    title: &str,
    description: &str,
    status: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO subgoals (goal_id, title, description, status) VALUES (?1, ?2, ?3, ?4)",
        params![goal_id, title, description, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_task(
    conn: &Connection,
    project_id: i64,
    title: &str,
    description: &str,
    status: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tasks (project_id, title, description, status) VALUES (?1, ?2, ?3, ?4)",
        params![project_id, title, description, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn assign_task(conn: &Connection, task_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?1, ?2)",
        params![task_id, user_id],
    )?;
    Ok(())
}

pub fn create_subtask(
    conn: &Connection,
    task_id: i64,
    title: &str,
    description: &str,
    status: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO subtasks (task_id, title, description, status) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, title, description, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn assign_subtask(conn: &Connection, subtask_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO subtask_assignees (subtask_id, user_id) VALUES (?1, ?2)",
        params![subtask_id, user_id],
    )?;
    Ok(())
}

pub fn create_comment(
    conn: &Connection,
    task_id: i64,
    subtask_id: Option<i64>,
    author_id: i64,
    content: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (task_id, subtask_id, author_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, subtask_id, author_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_sticky_note(
    conn: &Connection,
    project_id: i64,
    author_id: i64,
    text: &str,
    position_x: f64,
    position_y: f64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO sticky_notes (project_id, author_id, text, position_x, position_y)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![project_id, author_id, text, position_x, position_y],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_task(conn: &Connection, task_id: i64) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        "SELECT id, project_id, title, description, status, priority, created_at, updated_at
         FROM tasks WHERE id = ?1",
        params![task_id],
        |row| {
            Ok(Task {
                id: row.get(0)?,
                project_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                status: row.get(4)?,
                priority: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
    .optional()
}

pub fn get_subtask(conn: &Connection, subtask_id: i64) -> rusqlite::Result<Option<Subtask>> {
    conn.query_row(
        "SELECT id, task_id, title, description, status, created_at, updated_at
         FROM subtasks WHERE id = ?1",
        params![subtask_id],
        |row| {
            Ok(Subtask {
                id: row.get(0)?,
                task_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                status: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()
}

pub fn set_task_status(conn: &Connection, task_id: i64, status: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE tasks SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![task_id, status],
    )?;
    Ok(())
}

pub fn set_subtask_status(conn: &Connection, subtask_id: i64, status: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE subtasks SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![subtask_id, status],
    )?;
    Ok(())
}

pub fn set_goal_status(conn: &Connection, goal_id: i64, status: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE goals SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![goal_id, status],
    )?;
    Ok(())
}

pub fn set_subgoal_status(conn: &Connection, subgoal_id: i64, status: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE subgoals SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![subgoal_id, status],
    )?;
    Ok(())
}

pub fn task_assignees(conn: &Connection, task_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT user_id FROM task_assignees WHERE task_id = ?1")?;
    let rows = stmt.query_map(params![task_id], |row| row.get(0))?;
    rows.collect()
}

pub fn subtask_assignees(conn: &Connection, subtask_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT user_id FROM subtask_assignees WHERE subtask_id = ?1")?;
    let rows = stmt.query_map(params![subtask_id], |row| row.get(0))?;
    rows.collect()
}

/// Every user who is a member of any team attached to the project.
pub fn project_members(conn: &Connection, project_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT tm.user_id
         FROM team_members tm
         JOIN project_teams pt ON pt.team_id = tm.team_id
         WHERE pt.project_id = ?1",
    )?;
    let rows = stmt.query_map(params![project_id], |row| row.get(0))?;
    rows.collect()
}

pub fn team_name(conn: &Connection, team_id: i64) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM teams WHERE id = ?1",
        params![team_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn project_name(conn: &Connection, project_id: i64) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM projects WHERE id = ?1",
        params![project_id],
        |row| row.get(0),
    )
    .optional()
}

/// Project owning a subgoal, via its parent goal.
pub fn subgoal_project(conn: &Connection, subgoal_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT g.project_id FROM subgoals s JOIN goals g ON g.id = s.goal_id WHERE s.id = ?1",
        params![subgoal_id],
        |row| row.get(0),
    )
    .optional()
}

/// Insert a notification row. `subject` is the single entity reference the
/// notification points at, or None for the plain team-invite case.
pub fn insert_notification(
    conn: &Connection,
    recipient_id: i64,
    message: &str,
    subject: Option<(SubjectKind, i64)>,
) -> rusqlite::Result<i64> {
    let now = Utc::now().to_rfc3339();
    let (kind, id) = match subject {
        Some((kind, id)) => (Some(kind.as_str()), Some(id)),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO notifications (recipient_id, message, created_at, subject_kind, subject_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![recipient_id, message, now, kind, id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn notifications_for_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, message, is_read, created_at, subject_kind, subject_id
         FROM notifications WHERE recipient_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let kind: Option<String> = row.get(5)?;
        Ok(Notification {
            id: row.get(0)?,
            recipient_id: row.get(1)?,
            message: row.get(2)?,
            is_read: row.get(3)?,
            created_at: row.get(4)?,
            subject_kind: kind.as_deref().and_then(SubjectKind::from_str),
            subject_id: row.get(6)?,
        })
    })?;
    rows.collect()
}

pub fn mark_notification_read(conn: &Connection, notification_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![notification_id],
    )?;
    Ok(())
}

pub fn notification_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))
}
