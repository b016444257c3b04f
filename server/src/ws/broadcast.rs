//! Broadcast relay: copies a validated event to room members.
//!
//! Every event type except `cursor_update` is echoed to all members
//! including the sender — client UIs reconcile their optimistic state
//! against the echo. Cursor updates apply per-recipient self-suppression:
//! a connection never sees its own user's cursor, even from another tab,
//! while every other user's connections always receive it.

use axum::extract::ws::Message;

use crate::ws::protocol::MapEvent;
use crate::ws::rooms::RoomRegistry;

/// Relay an event to all members of a room, sender included.
pub fn broadcast_to_room(rooms: &RoomRegistry, project_id: i64, event: &MapEvent) {
    let Some(msg) = encode(event) else { return };
    rooms.send_to_room(project_id, &msg, |_| true);
}

/// Relay a cursor event to all members except connections owned by
/// `cursor_user_id`. The check runs per recipient at delivery time.
pub fn broadcast_cursor(
    rooms: &RoomRegistry,
    project_id: i64,
    cursor_user_id: Option<i64>,
    event: &MapEvent,
) {
    let Some(msg) = encode(event) else { return };
    rooms.send_to_room(project_id, &msg, |member| {
        match (member.user_id, cursor_user_id) {
            (Some(recipient), Some(owner)) => recipient != owner,
            _ => true,
        }
    });
}

fn encode(event: &MapEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode event for broadcast");
            None
        }
    }
}
