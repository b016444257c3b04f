pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod rooms;

pub use rooms::{new_room_registry, RoomMember, RoomRegistry, SharedRooms};
