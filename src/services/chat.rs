//! Chat service — message persistence and classification.
//!
//! DESIGN
//! ======
//! Messages are append-only and global: rooms scope live broadcast, not
//! history. Content is stored exactly as given; callers absolutize copies at
//! read/broadcast time so the stored value never depends on who asked.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Cap on messages returned to a joining client.
pub const HISTORY_LIMIT: i64 = 1000;

// =============================================================================
// TYPES
// =============================================================================

/// Broad media class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }

    /// Parse a wire or stored value; unknown kinds fall back to `Text`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "image" => Self::Image,
            "video" => Self::Video,
            "file" => Self::File,
            _ => Self::Text,
        }
    }

    /// Classify an upload by its declared MIME type. Never `Text`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }
}

/// One chat message as stored and broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Author display name at send time; renames do not rewrite history.
    pub user: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// Milliseconds since Unix epoch.
    pub ts: i64,
}

// =============================================================================
// STORE OPERATIONS
// =============================================================================

/// Persist one message exactly as given.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_message(pool: &SqlitePool, message: &Message) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO messages (id, user, type, content, ts) VALUES (?, ?, ?, ?, ?)")
        .bind(message.id)
        .bind(&message.user)
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(message.ts)
        .execute(pool)
        .await?;
    Ok(())
}

/// The newest `HISTORY_LIMIT` messages in timestamp-ascending order, content
/// as stored.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn recent_messages(pool: &SqlitePool) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, String, i64)>(
        "SELECT id, user, type, content, ts
         FROM (SELECT id, user, type, content, ts FROM messages ORDER BY ts DESC LIMIT ?)
         ORDER BY ts ASC, id ASC",
    )
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, user, kind, content, ts)| Message {
            id,
            user,
            kind: MessageKind::parse(&kind),
            content,
            ts,
        })
        .collect())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
