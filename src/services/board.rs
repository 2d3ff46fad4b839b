//! Board service — board, column, and card store operations.
//!
//! DESIGN
//! ======
//! Pure persistence operations over the SQLite pool; broadcasting is the
//! route layer's job. Position assignment happens inside the INSERT so a
//! create is one atomic statement (max existing position in scope + 1).
//!
//! ERROR HANDLING
//! ==============
//! Missing parents (board for a column, column for a card or move target)
//! are `NotFound` errors. A move or delete of an unknown card is not an
//! error: callers get `MoveOutcome::Missing` / `Ok(None)` and treat the
//! request as already satisfied.

use serde::Serialize;
use sqlx::SqlitePool;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("board not found: {0}")]
    BoardNotFound(i64),
    #[error("column not found: {0}")]
    ColumnNotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::event::ErrorCode for BoardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardNotFound(_) => "E_BOARD_NOT_FOUND",
            Self::ColumnNotFound(_) => "E_COLUMN_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// A board as listed by the REST API.
#[derive(Debug, Clone, Serialize)]
pub struct BoardRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnRow {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardRow {
    pub id: i64,
    pub column_id: i64,
    pub board_id: i64,
    pub title: String,
    pub position: i64,
}

/// Columns and cards of one board, both sorted for display.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub columns: Vec<ColumnRow>,
    pub cards: Vec<CardRow>,
}

/// Result of a move request. A missing card is reported, not raised.
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    Moved(CardRow),
    Unchanged(CardRow),
    Missing,
}

// =============================================================================
// BOARDS
// =============================================================================

/// List all boards.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_boards(pool: &SqlitePool) -> Result<Vec<BoardRow>, BoardError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM boards ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(id, name)| BoardRow { id, name }).collect())
}

/// Check whether a board exists.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn board_exists(pool: &SqlitePool, board_id: i64) -> Result<bool, BoardError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM boards WHERE id = ?")
        .bind(board_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Load a board's columns and cards, sorted by position then id.
///
/// # Errors
///
/// Returns `BoardNotFound` for an unknown board, or a database error.
pub async fn board_snapshot(pool: &SqlitePool, board_id: i64) -> Result<BoardSnapshot, BoardError> {
    if !board_exists(pool, board_id).await? {
        return Err(BoardError::BoardNotFound(board_id));
    }

    let columns = sqlx::query_as::<_, (i64, i64, String, i64)>(
        "SELECT id, board_id, title, position
         FROM columns
         WHERE board_id = ?
         ORDER BY position ASC, id ASC",
    )
    .bind(board_id)
    .fetch_all(pool)
    .await?;

    let cards = sqlx::query_as::<_, (i64, i64, i64, String, i64)>(
        "SELECT id, column_id, board_id, title, position
         FROM cards
         WHERE board_id = ?
         ORDER BY position ASC, id ASC",
    )
    .bind(board_id)
    .fetch_all(pool)
    .await?;

    Ok(BoardSnapshot {
        columns: columns
            .into_iter()
            .map(|(id, board_id, title, position)| ColumnRow { id, board_id, title, position })
            .collect(),
        cards: cards
            .into_iter()
            .map(|(id, column_id, board_id, title, position)| CardRow {
                id,
                column_id,
                board_id,
                title,
                position,
            })
            .collect(),
    })
}

// =============================================================================
// COLUMNS
// =============================================================================

/// Create a column appended to the end of its board.
///
/// # Errors
///
/// Returns `BoardNotFound` for an unknown board, or a database error.
pub async fn create_column(
    pool: &SqlitePool,
    board_id: i64,
    title: &str,
) -> Result<ColumnRow, BoardError> {
    if !board_exists(pool, board_id).await? {
        return Err(BoardError::BoardNotFound(board_id));
    }

    let (id, position): (i64, i64) = sqlx::query_as(
        "INSERT INTO columns (board_id, title, position)
         VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM columns WHERE board_id = ?))
         RETURNING id, position",
    )
    .bind(board_id)
    .bind(title)
    .bind(board_id)
    .fetch_one(pool)
    .await?;

    Ok(ColumnRow { id, board_id, title: title.to_string(), position })
}

/// Rename a column. Returns `None` when the column does not exist.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn rename_column(
    pool: &SqlitePool,
    column_id: i64,
    title: &str,
) -> Result<Option<ColumnRow>, BoardError> {
    let row: Option<(i64, i64)> =
        sqlx::query_as("UPDATE columns SET title = ? WHERE id = ? RETURNING board_id, position")
            .bind(title)
            .bind(column_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(board_id, position)| ColumnRow {
        id: column_id,
        board_id,
        title: title.to_string(),
        position,
    }))
}

// =============================================================================
// CARDS
// =============================================================================

/// Create a card appended to the end of its column.
///
/// # Errors
///
/// Returns `ColumnNotFound` for an unknown column, or a database error.
pub async fn create_card(
    pool: &SqlitePool,
    column_id: i64,
    title: &str,
) -> Result<CardRow, BoardError> {
    let column: Option<(i64,)> = sqlx::query_as("SELECT board_id FROM columns WHERE id = ?")
        .bind(column_id)
        .fetch_optional(pool)
        .await?;
    let Some((board_id,)) = column else {
        return Err(BoardError::ColumnNotFound(column_id));
    };

    let (id, position): (i64, i64) = sqlx::query_as(
        "INSERT INTO cards (column_id, board_id, title, position)
         VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM cards WHERE column_id = ?))
         RETURNING id, position",
    )
    .bind(column_id)
    .bind(board_id)
    .bind(title)
    .bind(column_id)
    .fetch_one(pool)
    .await?;

    Ok(CardRow { id, column_id, board_id, title: title.to_string(), position })
}

/// Apply a caller-provided `{column_id, position}` to a card. The card's
/// `board_id` follows the target column. Same column + same position is a
/// strict no-op (no write).
///
/// # Errors
///
/// Returns `ColumnNotFound` for an unknown target column, or a database
/// error. An unknown card is `MoveOutcome::Missing`, not an error.
pub async fn move_card(
    pool: &SqlitePool,
    card_id: i64,
    column_id: i64,
    position: i64,
) -> Result<MoveOutcome, BoardError> {
    let current: Option<(i64, i64, String, i64)> =
        sqlx::query_as("SELECT column_id, board_id, title, position FROM cards WHERE id = ?")
            .bind(card_id)
            .fetch_optional(pool)
            .await?;
    let Some((current_column, current_board, title, current_position)) = current else {
        return Ok(MoveOutcome::Missing);
    };

    if current_column == column_id && current_position == position {
        return Ok(MoveOutcome::Unchanged(CardRow {
            id: card_id,
            column_id,
            board_id: current_board,
            title,
            position,
        }));
    }

    let target: Option<(i64,)> = sqlx::query_as("SELECT board_id FROM columns WHERE id = ?")
        .bind(column_id)
        .fetch_optional(pool)
        .await?;
    let Some((board_id,)) = target else {
        return Err(BoardError::ColumnNotFound(column_id));
    };

    sqlx::query("UPDATE cards SET column_id = ?, board_id = ?, position = ? WHERE id = ?")
        .bind(column_id)
        .bind(board_id)
        .bind(position)
        .bind(card_id)
        .execute(pool)
        .await?;

    Ok(MoveOutcome::Moved(CardRow { id: card_id, column_id, board_id, title, position }))
}

/// Delete a card, returning the deleted row for broadcast, or `None` when it
/// was already gone.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_card(pool: &SqlitePool, card_id: i64) -> Result<Option<CardRow>, BoardError> {
    let row: Option<(i64, i64, String, i64)> = sqlx::query_as(
        "DELETE FROM cards WHERE id = ? RETURNING column_id, board_id, title, position",
    )
    .bind(card_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(column_id, board_id, title, position)| CardRow {
        id: card_id,
        column_id,
        board_id,
        title,
        position,
    }))
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
