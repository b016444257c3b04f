use crate::db::DbPool;
use crate::ws::SharedRooms;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Active project rooms and their WebSocket connections
    pub rooms: SharedRooms,
}
