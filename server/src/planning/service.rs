//! Mutation service for the planning entities the notification engine
//! watches.
//!
//! Every function takes the acting user explicitly and returns the domain
//! events the mutation produced, after feeding them to the engine. Status
//! updates capture an EntitySnapshot before the write and emit a status
//! event only when the diff reports a real transition.

use crate::db::store;
use crate::db::DbPool;
use crate::notify::engine;
use crate::notify::events::DomainEvent;
use crate::notify::snapshot::{diff, EntityKind, EntitySnapshot};

type ServiceResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Fields for a new task plus its initial assignees.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignees: Vec<i64>,
}

/// Fields for a new subtask plus its initial assignees.
#[derive(Debug, Clone)]
pub struct NewSubtask {
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assignees: Vec<i64>,
}

pub fn create_task(db: &DbPool, actor: i64, new: NewTask) -> ServiceResult<(i64, Vec<DomainEvent>)> {
    let (task_id, events) = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let task_id = store::create_task(&conn, new.project_id, &new.title, &new.description, &new.status)?;
        for assignee in &new.assignees {
            store::assign_task(&conn, task_id, *assignee)?;
        }
        (
            task_id,
            vec![DomainEvent::TaskCreated {
                task_id,
                title: new.title.clone(),
            }],
        )
    };
    engine::process_best_effort(db, actor, &events);
    Ok((task_id, events))
}

pub fn create_subtask(
    db: &DbPool,
    actor: i64,
    new: NewSubtask,
) -> ServiceResult<(i64, Vec<DomainEvent>)> {
    let (subtask_id, events) = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let subtask_id =
            store::create_subtask(&conn, new.task_id, &new.title, &new.description, &new.status)?;
        for assignee in &new.assignees {
            store::assign_subtask(&conn, subtask_id, *assignee)?;
        }
        (
            subtask_id,
            vec![DomainEvent::SubtaskCreated {
                subtask_id,
                title: new.title.clone(),
            }],
        )
    };
    engine::process_best_effort(db, actor, &events);
    Ok((subtask_id, events))
}

pub fn update_task_status(
    db: &DbPool,
    actor: i64,
    task_id: i64,
    new_status: &str,
) -> ServiceResult<Vec<DomainEvent>> {
    let events = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let before = EntitySnapshot::capture(&conn, EntityKind::Task, task_id)?;
        store::set_task_status(&conn, task_id, new_status)?;
        let after = EntitySnapshot::capture(&conn, EntityKind::Task, task_id)?;

        match diff(&before, &after) {
            Some(change) => {
                let title = store::get_task(&conn, task_id)?
                    .map(|t| t.title)
                    .unwrap_or_default();
                vec![DomainEvent::TaskStatusChanged {
                    task_id,
                    title,
                    change,
                }]
            }
            None => Vec::new(),
        }
    };
    engine::process_best_effort(db, actor, &events);
    Ok(events)
}

pub fn update_subtask_status(
    db: &DbPool,
    actor: i64,
    subtask_id: i64,
    new_status: &str,
) -> ServiceResult<Vec<DomainEvent>> {
    let events = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let before = EntitySnapshot::capture(&conn, EntityKind::Subtask, subtask_id)?;
        store::set_subtask_status(&conn, subtask_id, new_status)?;
        let after = EntitySnapshot::capture(&conn, EntityKind::Subtask, subtask_id)?;

        match diff(&before, &after) {
            Some(change) => {
                let title = store::get_subtask(&conn, subtask_id)?
                    .map(|s| s.title)
                    .unwrap_or_default();
                vec![DomainEvent::SubtaskStatusChanged {
                    subtask_id,
                    title,
                    change,
                }]
            }
            None => Vec::new(),
        }
    };
    engine::process_best_effort(db, actor, &events);
    Ok(events)
}

pub fn update_goal_status(
    db: &DbPool,
    actor: i64,
    goal_id: i64,
    new_status: &str,
) -> ServiceResult<Vec<DomainEvent>> {
    let events = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let before = EntitySnapshot::capture(&conn, EntityKind::Goal, goal_id)?;
        store::set_goal_status(&conn, goal_id, new_status)?;
        let after = EntitySnapshot::capture(&conn, EntityKind::Goal, goal_id)?;

        match diff(&before, &after) {
            Some(change) => {
                let (project_id, title): (i64, String) = conn.query_row(
                    "SELECT project_id, title FROM goals WHERE id = ?1",
                    rusqlite::params![goal_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                vec![DomainEvent::GoalStatusChanged {
                    goal_id,
                    project_id,
                    title,
                    change,
                }]
            }
            None => Vec::new(),
        }
    };
    engine::process_best_effort(db, actor, &events);
    Ok(events)
}

pub fn update_subgoal_status(
    db: &DbPool,
    actor: i64,
    subgoal_id: i64,
    new_status: &str,
) -> ServiceResult<Vec<DomainEvent>> {
    let events = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let before = EntitySnapshot::capture(&conn, EntityKind::Subgoal, subgoal_id)?;
        store::set_subgoal_status(&conn, subgoal_id, new_status)?;
        let after = EntitySnapshot::capture(&conn, EntityKind::Subgoal, subgoal_id)?;

        match diff(&before, &after) {
            Some(change) => {
                let project_id = store::subgoal_project(&conn, subgoal_id)?
                    .ok_or("Subgoal has no owning project")?;
                let title: String = conn.query_row(
                    "SELECT title FROM subgoals WHERE id = ?1",
                    rusqlite::params![subgoal_id],
                    |row| row.get(0),
                )?;
                vec![DomainEvent::SubgoalStatusChanged {
                    subgoal_id,
                    project_id,
                    title,
                    change,
                }]
            }
            None => Vec::new(),
        }
    };
    engine::process_best_effort(db, actor, &events);
    Ok(events)
}

pub fn create_comment(
    db: &DbPool,
    actor: i64,
    task_id: i64,
    subtask_id: Option<i64>,
    content: &str,
) -> ServiceResult<(i64, Vec<DomainEvent>)> {
    let (comment_id, events) = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let comment_id = store::create_comment(&conn, task_id, subtask_id, actor, content)?;
        let task_title = store::get_task(&conn, task_id)?
            .map(|t| t.title)
            .unwrap_or_default();
        (
            comment_id,
            vec![DomainEvent::CommentCreated {
                comment_id,
                task_id,
                subtask_id,
                task_title,
            }],
        )
    };
    engine::process_best_effort(db, actor, &events);
    Ok((comment_id, events))
}

pub fn add_team_member(
    db: &DbPool,
    actor: i64,
    team_id: i64,
    user_id: i64,
) -> ServiceResult<Vec<DomainEvent>> {
    let events = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        store::add_team_member(&conn, team_id, user_id)?;
        let team_name = store::team_name(&conn, team_id)?.ok_or("Unknown team")?;
        vec![DomainEvent::TeamMemberAdded {
            team_id,
            team_name,
            user_id,
        }]
    };
    engine::process_best_effort(db, actor, &events);
    Ok(events)
}

pub fn create_sticky_note(
    db: &DbPool,
    actor: i64,
    project_id: i64,
    text: &str,
    position_x: f64,
    position_y: f64,
) -> ServiceResult<(i64, Vec<DomainEvent>)> {
    let (sticky_id, events) = {
        let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
        let sticky_id =
            store::create_sticky_note(&conn, project_id, actor, text, position_x, position_y)?;
        let project_name = store::project_name(&conn, project_id)?.unwrap_or_default();
        (
            sticky_id,
            vec![DomainEvent::StickyNoteCreated {
                sticky_id,
                project_id,
                project_name,
            }],
        )
    };
    engine::process_best_effort(db, actor, &events);
    Ok((sticky_id, events))
}
