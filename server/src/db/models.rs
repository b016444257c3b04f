//! Database row types for the tables the collaboration core reads and writes.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

/// Task record. The core only consumes id/title/status and the project
/// reference for room scoping; the rest belongs to the CRUD layer.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Subtask record, nested under a task.
#[derive(Debug, Clone)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Project goal shown as a node on the strategic map.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub position_x: f64,
    pub position_y: f64,
}

/// Subgoal nested under a goal.
#[derive(Debug, Clone)]
pub struct Subgoal {
    pub id: i64,
    pub goal_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub position_x: f64,
    pub position_y: f64,
}

/// Last known cursor position per (user, project).
/// Upserted, never historized — one row per user per project.
#[derive(Debug, Clone)]
pub struct CursorPosition {
    pub user_id: i64,
    pub project_id: i64,
    pub position_x: f64,
    pub position_y: f64,
    pub last_updated: String,
}

/// The entity kind a notification refers to. A notification carries at most
/// one subject reference; the plain team-invite case carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Task,
    Subtask,
    Comment,
    Team,
    Goal,
    Subgoal,
    StickyNote,
}

impl SubjectKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task" => Some(Self::Task),
            "subtask" => Some(Self::Subtask),
            "comment" => Some(Self::Comment),
            "team" => Some(Self::Team),
            "goal" => Some(Self::Goal),
            "subgoal" => Some(Self::Subgoal),
            "sticky_note" => Some(Self::StickyNote),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Subtask => "subtask",
            Self::Comment => "comment",
            Self::Team => "team",
            Self::Goal => "goal",
            Self::Subgoal => "subgoal",
            Self::StickyNote => "sticky_note",
        }
    }
}

/// Notification record produced by the change-notification engine and
/// consumed by the REST layer. Mutated only by read-state toggles.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
    pub subject_kind: Option<SubjectKind>,
    pub subject_id: Option<i64>,
}
