//! Change-notification fan-out engine.
//!
//! Consumes domain events synchronously after a mutation and decides, per
//! event, who gets told and what. The acting user is always excluded and
//! recipient sets are de-duplicated, so exactly one notification row is
//! written per (event, recipient). Runs best-effort: a failure here must
//! never roll back or block the mutation it is attached to.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::db::models::SubjectKind;
use crate::db::store;
use crate::db::DbPool;
use crate::notify::events::DomainEvent;

/// Process a batch of events: compute recipients and persist notification
/// rows. Returns the number of rows written.
pub fn process(
    db: &DbPool,
    actor: i64,
    events: &[DomainEvent],
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let mut written = 0;

    for event in events {
        let (recipients, message, subject) = plan(&conn, event)?;
        for recipient in recipients {
            if recipient == actor {
                continue;
            }
            store::insert_notification(&conn, recipient, &message, subject)?;
            written += 1;
        }
    }

    Ok(written)
}

/// Best-effort wrapper used by the mutation service: log and move on.
pub fn process_best_effort(db: &DbPool, actor: i64, events: &[DomainEvent]) {
    if events.is_empty() {
        return;
    }
    match process(db, actor, events) {
        Ok(written) => {
            tracing::debug!(actor, events = events.len(), written, "Notifications written");
        }
        Err(e) => {
            tracing::warn!(actor, error = %e, "Notification fan-out failed");
        }
    }
}

/// Resolve one event into (recipient set, rendered message, subject ref).
fn plan(
    conn: &Connection,
    event: &DomainEvent,
) -> Result<(BTreeSet<i64>, String, Option<(SubjectKind, i64)>), Box<dyn std::error::Error + Send + Sync>>
{
    let plan = match event {
        DomainEvent::TaskCreated { task_id, title } => (
            collect(store::task_assignees(conn, *task_id)?),
            format!("You were assigned to task \"{}\"", title),
            Some((SubjectKind::Task, *task_id)),
        ),
        DomainEvent::SubtaskCreated { subtask_id, title } => (
            collect(store::subtask_assignees(conn, *subtask_id)?),
            format!("You were assigned to subtask \"{}\"", title),
            Some((SubjectKind::Subtask, *subtask_id)),
        ),
        DomainEvent::TaskStatusChanged {
            task_id,
            title,
            change,
        } => (
            collect(store::task_assignees(conn, *task_id)?),
            format!("Task \"{}\" status changed to {}", title, change.to),
            Some((SubjectKind::Task, *task_id)),
        ),
        DomainEvent::SubtaskStatusChanged {
            subtask_id,
            title,
            change,
        } => (
            collect(store::subtask_assignees(conn, *subtask_id)?),
            format!("Subtask \"{}\" status changed to {}", title, change.to),
            Some((SubjectKind::Subtask, *subtask_id)),
        ),
        DomainEvent::GoalStatusChanged {
            goal_id,
            project_id,
            title,
            change,
        } => (
            collect(store::project_members(conn, *project_id)?),
            format!("Goal \"{}\" status changed to {}", title, change.to),
            Some((SubjectKind::Goal, *goal_id)),
        ),
        DomainEvent::SubgoalStatusChanged {
            subgoal_id,
            project_id,
            title,
            change,
        } => (
            collect(store::project_members(conn, *project_id)?),
            format!("Subgoal \"{}\" status changed to {}", title, change.to),
            Some((SubjectKind::Subgoal, *subgoal_id)),
        ),
        DomainEvent::CommentCreated {
            comment_id,
            task_id,
            subtask_id,
            task_title,
        } => {
            // Union of the parent task's assignees and, for subtask
            // comments, the subtask's assignees.
            let mut recipients = collect(store::task_assignees(conn, *task_id)?);
            if let Some(subtask_id) = subtask_id {
                recipients.extend(store::subtask_assignees(conn, *subtask_id)?);
            }
            (
                recipients,
                format!("New comment on task \"{}\"", task_title),
                Some((SubjectKind::Comment, *comment_id)),
            )
        }
        DomainEvent::TeamMemberAdded {
            team_id,
            team_name,
            user_id,
        } => (
            BTreeSet::from([*user_id]),
            format!("You were added to team \"{}\"", team_name),
            Some((SubjectKind::Team, *team_id)),
        ),
        DomainEvent::StickyNoteCreated {
            sticky_id,
            project_id,
            project_name,
        } => (
            collect(store::project_members(conn, *project_id)?),
            format!("New sticky note on project \"{}\"", project_name),
            Some((SubjectKind::StickyNote, *sticky_id)),
        ),
    };
    Ok(plan)
}

fn collect(ids: Vec<i64>) -> BTreeSet<i64> {
    ids.into_iter().collect()
}
