//! Room registry: tracks which connections belong to which project room.
//!
//! Backed by a DashMap keyed by project id. DashMap's per-shard locking
//! makes join/leave and fan-out mutually exclusive for the same room while
//! rooms on different shards never contend — a leaving connection cannot
//! receive a send racing its removal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};

/// Bound on the per-connection outbound queue. A peer that falls this far
/// behind is disconnected rather than allowed to stall the room.
pub const OUTBOUND_QUEUE: usize = 256;

/// One connection's handle inside a room: identity, outbound queue, and a
/// kill switch its actor listens on.
#[derive(Clone)]
pub struct RoomMember {
    /// Process-unique connection id, distinct even across tabs of one user.
    pub conn_id: u64,
    /// None for connections that presented no valid credential.
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub tx: mpsc::Sender<Message>,
    pub kill: Arc<Notify>,
}

#[derive(Default)]
struct Room {
    members: Vec<RoomMember>,
}

/// Registry of all active rooms. Rooms are ephemeral: created lazily on the
/// first join, removed when the last member leaves.
pub struct RoomRegistry {
    rooms: DashMap<i64, Room>,
    next_conn_id: AtomicU64,
}

pub type SharedRooms = Arc<RoomRegistry>;

/// Create a new empty room registry.
pub fn new_room_registry() -> SharedRooms {
    Arc::new(RoomRegistry {
        rooms: DashMap::new(),
        next_conn_id: AtomicU64::new(1),
    })
}

impl RoomRegistry {
    /// Allocate a connection id for a new socket.
    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a connection to a project room, creating the room if needed.
    /// Joining twice with the same connection id is idempotent.
    pub fn join(&self, project_id: i64, member: RoomMember) {
        let mut room = self.rooms.entry(project_id).or_default();
        if !room.members.iter().any(|m| m.conn_id == member.conn_id) {
            room.members.push(member);
        }
        tracing::debug!(
            project_id,
            members = room.members.len(),
            "Connection joined room"
        );
    }

    /// Remove a connection from a project room. Leaving a room it never
    /// joined (or leaving twice) is a no-op. Empty rooms are dropped.
    pub fn leave(&self, project_id: i64, conn_id: u64) {
        if let Some(mut room) = self.rooms.get_mut(&project_id) {
            room.members.retain(|m| m.conn_id != conn_id);
        }
        self.rooms
            .remove_if(&project_id, |_, room| room.members.is_empty());
        tracing::debug!(project_id, conn_id, "Connection left room");
    }

    /// Number of connections currently in a room.
    pub fn member_count(&self, project_id: i64) -> usize {
        self.rooms
            .get(&project_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }

    /// Send a prepared frame to every member of a room that passes `filter`.
    /// Holds the room's shard entry for the duration of the fan-out, so
    /// membership cannot change mid-broadcast. Sends are non-blocking: a
    /// member whose queue is full is disconnected via its kill handle.
    pub(crate) fn send_to_room<F>(&self, project_id: i64, msg: &Message, filter: F)
    where
        F: Fn(&RoomMember) -> bool,
    {
        let Some(room) = self.rooms.get(&project_id) else {
            return;
        };
        for member in room.members.iter() {
            if !filter(member) {
                continue;
            }
            match member.tx.try_send(msg.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        project_id,
                        conn_id = member.conn_id,
                        username = ?member.username,
                        "Outbound queue full, disconnecting slow peer"
                    );
                    member.kill.notify_one();
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Actor already shutting down; leave() will clean up.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(registry: &RoomRegistry, user_id: Option<i64>) -> (RoomMember, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        (
            RoomMember {
                conn_id: registry.next_conn_id(),
                user_id,
                username: None,
                tx,
                kill: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    #[test]
    fn join_is_idempotent() {
        let rooms = new_room_registry();
        let (m, _rx) = member(&rooms, Some(1));
        rooms.join(5, m.clone());
        rooms.join(5, m);
        assert_eq!(rooms.member_count(5), 1);
    }

    #[test]
    fn leave_unknown_room_is_noop() {
        let rooms = new_room_registry();
        rooms.leave(99, 1);
        assert_eq!(rooms.member_count(99), 0);
    }

    #[test]
    fn empty_room_is_dropped() {
        let rooms = new_room_registry();
        let (m, _rx) = member(&rooms, Some(1));
        let conn_id = m.conn_id;
        rooms.join(5, m);
        rooms.leave(5, conn_id);
        rooms.leave(5, conn_id); // double-leave is a no-op
        assert_eq!(rooms.member_count(5), 0);
        assert!(rooms.rooms.get(&5).is_none());
    }

    #[tokio::test]
    async fn overflowing_member_is_killed_while_peers_keep_receiving() {
        let rooms = new_room_registry();
        // The slow member's receiver stays alive but is never drained.
        let (slow, _slow_rx) = member(&rooms, Some(1));
        let (fast, mut fast_rx) = member(&rooms, Some(2));
        let slow_kill = slow.kill.clone();
        rooms.join(7, slow);
        rooms.join(7, fast);

        let msg = Message::Text(r#"{"type":"delete_goal","goal_id":1}"#.into());
        for i in 0..=OUTBOUND_QUEUE {
            rooms.send_to_room(7, &msg, |_| true);
            // Draining per send keeps the healthy member's queue clear.
            assert!(fast_rx.try_recv().is_ok(), "fast member missed frame {}", i);
        }

        // The send past the bound must have fired the kill handle.
        tokio::time::timeout(std::time::Duration::from_millis(100), slow_kill.notified())
            .await
            .expect("slow member was not killed on queue overflow");
    }

    #[test]
    fn rooms_are_independent() {
        let rooms = new_room_registry();
        let (a, _rx_a) = member(&rooms, Some(1));
        let (b, _rx_b) = member(&rooms, Some(2));
        rooms.join(1, a);
        rooms.join(2, b);
        assert_eq!(rooms.member_count(1), 1);
        assert_eq!(rooms.member_count(2), 1);
    }
}
