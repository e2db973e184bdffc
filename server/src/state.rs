use std::sync::Arc;

use crate::chat::presence::PresenceRegistry;
use crate::config::RealtimeConfig;
use crate::db::DbPool;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT validation secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Identity -> live connection, shared by every connection task
    pub presence: Arc<PresenceRegistry>,
    pub realtime: Arc<RealtimeConfig>,
}

impl AppState {
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, realtime: RealtimeConfig) -> Self {
        Self {
            db,
            jwt_secret,
            presence: Arc::new(PresenceRegistry::new()),
            realtime: Arc::new(realtime),
        }
    }
}
