//! Kanban REST routes.
//!
//! DESIGN
//! ======
//! Handlers validate, call the board service, broadcast the committed change
//! to the board's room, and return the entity JSON the clients render. The
//! broadcast payload and the HTTP response body are built from the same
//! value, so subscribers and the caller always see identical entities.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::event::Event;
use crate::rooms::board_room;
use crate::services::board::{self, BoardRow, BoardSnapshot, MoveOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TitleBody {
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveCardBody {
    pub column_id: i64,
    pub position: i64,
}

/// `GET /api/boards` — list all boards.
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<BoardRow>>, StatusCode> {
    let rows = board::list_boards(&state.pool).await.map_err(board_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/boards/:id` — columns + cards, sorted for display.
pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
) -> Result<Json<BoardSnapshot>, StatusCode> {
    let snapshot =
        board::board_snapshot(&state.pool, board_id).await.map_err(board_error_to_status)?;
    Ok(Json(snapshot))
}

/// `POST /api/boards/:id/columns` — create a column at the end of the board.
pub async fn create_column(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    Json(body): Json<TitleBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let Some(title) = clean_title(body.title.as_deref()) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let column =
        board::create_column(&state.pool, board_id, title).await.map_err(board_error_to_status)?;
    info!(%board_id, column_id = column.id, position = column.position, "column created");

    let payload = entity_json(&column);
    broadcast_board_event(&state, board_id, "column.created", payload.clone()).await;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// `PUT /api/columns/:id` — rename a column.
pub async fn rename_column(
    State(state): State<AppState>,
    Path(column_id): Path<i64>,
    Json(body): Json<TitleBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Some(title) = clean_title(body.title.as_deref()) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let column = board::rename_column(&state.pool, column_id, title)
        .await
        .map_err(board_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    info!(column_id, board_id = column.board_id, "column renamed");

    let payload = entity_json(&column);
    broadcast_board_event(&state, column.board_id, "column.updated", payload.clone()).await;
    Ok(Json(payload))
}

/// `POST /api/columns/:id/cards` — create a card at the end of the column.
pub async fn create_card(
    State(state): State<AppState>,
    Path(column_id): Path<i64>,
    Json(body): Json<TitleBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let Some(title) = clean_title(body.title.as_deref()) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let card =
        board::create_card(&state.pool, column_id, title).await.map_err(board_error_to_status)?;
    info!(column_id, card_id = card.id, position = card.position, "card created");

    let payload = entity_json(&card);
    broadcast_board_event(&state, card.board_id, "card.created", payload.clone()).await;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// `PUT /api/cards/:id` — apply a move. An unknown card acknowledges instead
/// of failing, so a stale drag racing a delete stays quiet on the client.
pub async fn move_card(
    State(state): State<AppState>,
    Path(card_id): Path<i64>,
    Json(body): Json<MoveCardBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let outcome = board::move_card(&state.pool, card_id, body.column_id, body.position)
        .await
        .map_err(board_error_to_status)?;

    match outcome {
        MoveOutcome::Moved(card) => {
            info!(card_id, column_id = card.column_id, position = card.position, "card moved");
            let payload = entity_json(&card);
            broadcast_board_event(&state, card.board_id, "card.updated", payload.clone()).await;
            Ok(Json(payload))
        }
        // Same column, same position: nothing changed, nothing to announce.
        MoveOutcome::Unchanged(card) => Ok(Json(entity_json(&card))),
        MoveOutcome::Missing => Ok(Json(serde_json::json!({ "ok": true }))),
    }
}

/// `DELETE /api/cards/:id` — remove a card; broadcast only when a row
/// actually went away. Always 204.
pub async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deleted = board::delete_card(&state.pool, card_id).await.map_err(board_error_to_status)?;

    if let Some(card) = deleted {
        info!(card_id, board_id = card.board_id, "card deleted");
        broadcast_board_event(
            &state,
            card.board_id,
            "card.deleted",
            serde_json::json!({ "id": card_id }),
        )
        .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn broadcast_board_event(
    state: &AppState,
    board_id: i64,
    name: &str,
    payload: serde_json::Value,
) {
    state.rooms.publish(&board_room(board_id), &Event::new(name, payload), None).await;
}

fn entity_json<T: Serialize>(entity: &T) -> serde_json::Value {
    serde_json::to_value(entity).unwrap_or_default()
}

fn clean_title(title: Option<&str>) -> Option<&str> {
    let trimmed = title?.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

pub(crate) fn board_error_to_status(err: board::BoardError) -> StatusCode {
    match err {
        board::BoardError::BoardNotFound(_) | board::BoardError::ColumnNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        board::BoardError::Database(ref e) => {
            tracing::error!(error = %e, "board route database error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
