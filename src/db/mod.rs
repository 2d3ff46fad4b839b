//! SQLite pool setup and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses this module to open the embedded SQLite store, enforce schema
//! migrations, and seed the default board before accepting websocket/API
//! traffic. Tests reuse `MIGRATOR` against in-memory pools.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub static MIGRATOR: Migrator = sqlx::migrate!("src/db/migrations");

const DEFAULT_BOARD_NAME: &str = "Main";

/// Open the `SQLite` pool, run migrations, and seed the default board.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub async fn init_pool(db_file: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    seed_default_board(&pool).await?;

    Ok(pool)
}

/// Insert the "Main" board when the store has none, so the kanban client
/// always finds a workspace.
async fn seed_default_board(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM boards")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    sqlx::query("INSERT INTO boards (name) VALUES (?)")
        .bind(DEFAULT_BOARD_NAME)
        .execute(pool)
        .await?;
    tracing::info!(name = DEFAULT_BOARD_NAME, "seeded default board");
    Ok(())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
