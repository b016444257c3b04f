//! Domain events emitted by the mutation service.
//!
//! `save()` returns these explicitly instead of firing framework hooks, so
//! the dependency on the notification engine stays visible and testable.

use crate::notify::snapshot::StatusChange;

/// One entity mutation worth telling someone about. Events carry the ids
/// the engine needs to resolve recipients plus the already-known display
/// fields, never the acting user — the actor is passed alongside.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    TaskCreated {
        task_id: i64,
        title: String,
    },
    TaskStatusChanged {
        task_id: i64,
        title: String,
        change: StatusChange,
    },
    SubtaskCreated {
        subtask_id: i64,
        title: String,
    },
    SubtaskStatusChanged {
        subtask_id: i64,
        title: String,
        change: StatusChange,
    },
    GoalStatusChanged {
        goal_id: i64,
        project_id: i64,
        title: String,
        change: StatusChange,
    },
    SubgoalStatusChanged {
        subgoal_id: i64,
        project_id: i64,
        title: String,
        change: StatusChange,
    },
    CommentCreated {
        comment_id: i64,
        task_id: i64,
        subtask_id: Option<i64>,
        task_title: String,
    },
    TeamMemberAdded {
        team_id: i64,
        team_name: String,
        user_id: i64,
    },
    StickyNoteCreated {
        sticky_id: i64,
        project_id: i64,
        project_name: String,
    },
}
