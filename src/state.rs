//! Shared state injected into every handler.
//!
//! DESIGN
//! ======
//! Axum hands `AppState` to every handler through the `State` extractor. It
//! holds the database pool, the room registry for realtime fan-out, and the
//! resolved configuration. Clone is required by Axum — all inner fields are
//! Arc-wrapped or Clone.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::rooms::Rooms;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub rooms: Rooms,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self { pool, rooms: Rooms::new(), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
