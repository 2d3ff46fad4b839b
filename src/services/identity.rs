//! Identity resolution for chat visitors.
//!
//! DESIGN
//! ======
//! No accounts: a visitor is whoever shows up with an (ip, clientId) pair.
//! Lookup prefers the opaque client id (stable across networks), falls back
//! to ip, and otherwise creates a row named "Unnamed N". The N suffix is
//! allocated from a dedicated counter column so a rename never frees its
//! number.

use sqlx::{Row, SqlitePool};
use sqlx::sqlite::SqliteRow;

/// Persisted chat visitor.
#[derive(Debug, Clone)]
pub struct ChatUser {
    pub id: i64,
    pub ip: Option<String>,
    pub client_id: Option<String>,
    pub name: String,
}

/// Resolve a connection to a persisted user, creating one on first contact.
///
/// Lookup prefers `client_id`; an ip match with no stored client id adopts
/// the presented one; an ip match already bound to a different client id is
/// treated as a new visitor.
///
/// # Errors
///
/// Returns a database error if any lookup or insert fails.
pub async fn resolve(
    pool: &SqlitePool,
    ip: &str,
    client_id: Option<&str>,
) -> Result<ChatUser, sqlx::Error> {
    if let Some(cid) = client_id {
        if let Some(user) = find_by_client_id(pool, cid).await? {
            return Ok(user);
        }
    }

    if let Some(user) = find_by_ip(pool, ip).await? {
        match (client_id, &user.client_id) {
            (Some(cid), None) => return adopt_client_id(pool, user, cid).await,
            (Some(_), Some(_)) => {
                // The ip is already bound to another browser; fall through
                // and create a fresh visitor.
            }
            _ => return Ok(user),
        }
    }

    create_user(pool, ip, client_id).await
}

/// Persist a new display name. Generated suffixes stay allocated.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn rename(pool: &SqlitePool, user_id: i64, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET name = ? WHERE id = ?")
        .bind(name)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn find_by_client_id(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Option<ChatUser>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, ip, client_id, name FROM users WHERE client_id = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(user_from_row))
}

async fn find_by_ip(pool: &SqlitePool, ip: &str) -> Result<Option<ChatUser>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, ip, client_id, name FROM users WHERE ip = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(ip)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(user_from_row))
}

fn user_from_row(row: SqliteRow) -> ChatUser {
    ChatUser {
        id: row.get("id"),
        ip: row.get("ip"),
        client_id: row.get("client_id"),
        name: row.get("name"),
    }
}

async fn adopt_client_id(
    pool: &SqlitePool,
    mut user: ChatUser,
    client_id: &str,
) -> Result<ChatUser, sqlx::Error> {
    sqlx::query("UPDATE users SET client_id = ? WHERE id = ?")
        .bind(client_id)
        .bind(user.id)
        .execute(pool)
        .await?;
    user.client_id = Some(client_id.to_string());
    Ok(user)
}

async fn create_user(
    pool: &SqlitePool,
    ip: &str,
    client_id: Option<&str>,
) -> Result<ChatUser, sqlx::Error> {
    let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) + 1 AS next FROM users")
        .fetch_one(pool)
        .await?;
    let seq: i64 = row.get("next");
    let name = format!("Unnamed {seq}");

    let result = sqlx::query("INSERT INTO users (ip, client_id, name, seq) VALUES (?, ?, ?, ?)")
        .bind(ip)
        .bind(client_id)
        .bind(&name)
        .bind(seq)
        .execute(pool)
        .await?;

    tracing::info!(user_id = result.last_insert_rowid(), %name, %ip, "identity: new visitor");
    Ok(ChatUser {
        id: result.last_insert_rowid(),
        ip: Some(ip.to_string()),
        client_id: client_id.map(ToString::to_string),
        name,
    })
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
