//! Router assembly and static serving.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves everything: the board REST API, the websocket
//! endpoint, multipart uploads, uploaded media as static files with
//! long-lived cache headers, and the built client bundle as an SPA fallback
//! (unmatched routes return the app shell).

pub mod boards;
pub mod upload;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode, header};
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

/// Build the full application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Stored names embed a timestamp + uuid, so uploaded media never changes
    // under a given URL and can be cached forever.
    let uploads = Router::new()
        .fallback_service(ServeDir::new(&state.config.upload_dir))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        ));

    let dist = state.config.client_dist.clone();
    let spa = ServeDir::new(&dist).not_found_service(ServeFile::new(dist.join("index.html")));

    Router::new()
        .route("/api/boards", get(boards::list_boards))
        .route("/api/boards/{id}", get(boards::get_board))
        .route("/api/boards/{id}/columns", post(boards::create_column))
        .route("/api/columns/{id}", put(boards::rename_column))
        .route("/api/columns/{id}/cards", post(boards::create_card))
        .route("/api/cards/{id}", put(boards::move_card).delete(boards::delete_card))
        .route("/upload", post(upload::upload).layer(DefaultBodyLimit::disable()))
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .nest("/uploads", uploads)
        .fallback_service(spa)
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
