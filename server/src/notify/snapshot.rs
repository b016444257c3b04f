//! Entity snapshots: the "before" side of the status diff.
//!
//! The mutation service captures a snapshot immediately before applying a
//! write and a second one after, then asks `diff` whether the
//! discriminating field actually changed. The engine never reaches into
//! ambient state to reconstruct history.

use rusqlite::{params, Connection, OptionalExtension};

/// The mutable entity kinds whose status transitions drive notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Subtask,
    Goal,
    Subgoal,
}

impl EntityKind {
    fn table(&self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Subtask => "subtasks",
            Self::Goal => "goals",
            Self::Subgoal => "subgoals",
        }
    }
}

/// Transient capture of an entity's status, keyed by entity id.
/// Consumed once by the diff step and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub entity_id: i64,
    /// None when the entity row does not exist.
    pub status: Option<String>,
}

impl EntitySnapshot {
    /// Read the entity's current status. Table names are fixed per kind;
    /// only the id is interpolated, as a bound parameter.
    pub fn capture(conn: &Connection, kind: EntityKind, entity_id: i64) -> rusqlite::Result<Self> {
        let sql = format!("SELECT status FROM {} WHERE id = ?1", kind.table());
        let status = conn
            .query_row(&sql, params![entity_id], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(Self {
            kind,
            entity_id,
            status,
        })
    }
}

/// An observed status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
}

/// Compare two snapshots of the same entity. Returns the transition only
/// when both sides exist and the status genuinely differs — saving a row
/// with an unchanged status produces no change and thus no notifications.
pub fn diff(before: &EntitySnapshot, after: &EntitySnapshot) -> Option<StatusChange> {
    match (&before.status, &after.status) {
        (Some(from), Some(to)) if from != to => Some(StatusChange {
            from: from.clone(),
            to: to.clone(),
        }),
        _ => None,
    }
}
