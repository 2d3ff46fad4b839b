//! Room registry — explicit membership for broadcast fan-out.
//!
//! DESIGN
//! ======
//! - A room is just a name: `board:{id}` for kanban event channels, plain
//!   names ("general") for chat.
//! - Members are per-connection mpsc senders registered by the WS handler.
//!   Fan-out is best-effort `try_send`; a slow client loses events rather
//!   than blocking the publisher.
//! - Empty rooms are evicted on last unsubscribe.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::info;
use uuid::Uuid;

use crate::event::Event;

/// Name of the broadcast room carrying one board's kanban events.
#[must_use]
pub fn board_room(board_id: i64) -> String {
    format!("board:{board_id}")
}

/// Shared map of room name → connected subscribers.
#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<RwLock<HashMap<String, HashMap<Uuid, mpsc::Sender<Event>>>>>,
}

impl Rooms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's sender in a room. Idempotent per (room, id).
    pub async fn subscribe(&self, room: &str, client_id: Uuid, tx: mpsc::Sender<Event>) {
        let mut rooms = self.inner.write().await;
        let members = rooms.entry(room.to_owned()).or_default();
        members.insert(client_id, tx);
        info!(%room, %client_id, members = members.len(), "room: subscribe");
    }

    /// Drop a connection from a room; evicts the room when it empties.
    pub async fn unsubscribe(&self, room: &str, client_id: Uuid) {
        let mut rooms = self.inner.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        members.remove(&client_id);
        info!(%room, %client_id, members = members.len(), "room: unsubscribe");
        if members.is_empty() {
            rooms.remove(room);
        }
    }

    /// Fan an event out to every member of a room, optionally excluding one
    /// connection (usually the originator).
    pub async fn publish(&self, room: &str, event: &Event, exclude: Option<Uuid>) {
        let rooms = self.inner.read().await;
        let Some(members) = rooms.get(room) else {
            return;
        };
        for (client_id, tx) in members {
            if exclude == Some(*client_id) {
                continue;
            }
            // Best-effort: skip clients whose channel is full or closed.
            let _ = tx.try_send(event.clone());
        }
    }

    /// Number of live subscribers in a room.
    pub async fn member_count(&self, room: &str) -> usize {
        let rooms = self.inner.read().await;
        rooms.get(room).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
