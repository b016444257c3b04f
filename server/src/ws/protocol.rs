//! Inbound message envelope and dispatch.
//!
//! Frames are UTF-8 JSON objects tagged by a mandatory `type` field. The
//! protocol is fire-and-forget: malformed JSON, a missing `type`, or an
//! unrecognized `type` drops the frame without an error frame back, and the
//! connection stays open. Missing fields are forwarded as null, never
//! rejected.

use serde::{Deserialize, Serialize};

use crate::map::cursor;
use crate::state::AppState;
use crate::ws::broadcast;

/// A recognized strategic-map event. Field names and types mirror the wire
/// protocol exactly; every payload field is optional so that partially
/// filled frames are relayed as-is with nulls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    CursorUpdate {
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    StickyUpdate {
        #[serde(default)]
        sticky_id: Option<i64>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        position_x: Option<f64>,
        #[serde(default)]
        position_y: Option<f64>,
    },
    GoalUpdate {
        #[serde(default)]
        goal_id: Option<i64>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        position_x: Option<f64>,
        #[serde(default)]
        position_y: Option<f64>,
    },
    SubgoalUpdate {
        #[serde(default)]
        subgoal_id: Option<i64>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        position_x: Option<f64>,
        #[serde(default)]
        position_y: Option<f64>,
    },
    TaskUpdate {
        #[serde(default)]
        task_id: Option<i64>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        status: Option<String>,
    },
    ConnectionUpdate {
        #[serde(default)]
        connection_id: Option<i64>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
    DeleteGoal {
        #[serde(default)]
        goal_id: Option<i64>,
    },
    ConnectionDelete {
        #[serde(default)]
        connection_id: Option<i64>,
    },
}

/// Parse one text frame. Returns None for anything that is not a recognized
/// event; the caller discards such frames silently.
pub fn parse_frame(text: &str) -> Option<MapEvent> {
    match serde_json::from_str::<MapEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping unrecognized frame");
            None
        }
    }
}

/// Handle one inbound text frame from a connection.
///
/// Unauthenticated connections may listen but not speak: any recognized
/// event from them is dropped without a reply (permissive-connect,
/// restrictive-act). Cursor updates are persisted best-effort before the
/// relay; everything else is relay-only.
pub async fn handle_frame(
    text: &str,
    state: &AppState,
    project_id: i64,
    auth_user_id: Option<i64>,
) {
    let Some(event) = parse_frame(text) else {
        return;
    };

    let Some(actor_id) = auth_user_id else {
        tracing::debug!(project_id, "Dropping event from unauthenticated connection");
        return;
    };

    match &event {
        MapEvent::CursorUpdate { user_id, x, y, .. } => {
            // Persistence and broadcast are independent: a failed upsert is
            // logged inside persist_position and the relay still runs.
            cursor::persist_position(&state.db, actor_id, project_id, *x, *y).await;
            broadcast::broadcast_cursor(&state.rooms, project_id, *user_id, &event);
        }
        _ => {
            broadcast::broadcast_to_room(&state.rooms, project_id, &event);
        }
    }
}
