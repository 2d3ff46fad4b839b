//! WebSocket handler — chat rooms, profile updates, board event rooms.
//!
//! DESIGN
//! ======
//! On upgrade, the connection's client IP and base URL are resolved once
//! from the handshake headers, then the task enters a `select!` loop:
//! - Inbound client events → parse + dispatch by event name prefix
//! - Events published by room peers → forward to the client
//!
//! Handlers validate, mutate state, and publish peer traffic through
//! `Rooms`; events they return go to the sender only. The transport loop
//! owns nothing but socket I/O.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → capture ip + base URL
//! 2. `chat:join` → resolve identity, subscribe, reply `profile` + history,
//!    announce to the rest of the room
//! 3. Further events dispatch by prefix (`chat`, `profile`, `board`)
//! 4. Close → unsubscribe from every joined room

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::event::{Event, now_ms};
use crate::rooms::board_room;
use crate::services::board;
use crate::services::chat::{self, MessageKind};
use crate::services::identity::{self, ChatUser};
use crate::state::AppState;
use crate::urls::{absolutize, base_url, client_ip};

/// Room joined when `chat:join` carries no room name.
const DEFAULT_ROOM: &str = "general";

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// Per-connection state: resolved identity, joined rooms, and the channel
/// peers use to reach this client.
struct Conn {
    client_id: Uuid,
    ip: String,
    base_url: String,
    tx: mpsc::Sender<Event>,
    user: Option<ChatUser>,
    chat_rooms: HashSet<String>,
    board_room: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let ip = client_ip(&headers, remote);
    let base = base_url(state.config.public_base_url.as_deref(), &headers);
    ws.on_upgrade(move |socket| run_ws(socket, state, ip, base))
}

// =============================================================================
// CONNECTION LOOP
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, ip: String, base_url: String) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for events published by room peers.
    let (tx, mut rx) = mpsc::channel::<Event>(256);

    let mut conn = Conn {
        client_id,
        ip,
        base_url,
        tx,
        user: None,
        chat_rooms: HashSet::new(),
        board_room: None,
    };

    info!(%client_id, ip = %conn.ip, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_event(&state, &mut socket, &mut conn, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    for room in &conn.chat_rooms {
        state.rooms.unsubscribe(room, conn.client_id).await;
    }
    if let Some(room) = &conn.board_room {
        state.rooms.unsubscribe(room, conn.client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse an incoming event, dispatch to its handler, send replies to sender.
async fn dispatch_event(state: &AppState, socket: &mut WebSocket, conn: &mut Conn, text: &str) {
    for event in process_event(state, conn, text).await {
        let _ = send_event(socket, &event).await;
    }
}

/// Parse and process one inbound text message, returning the events owed to
/// the sender. Peer traffic is published through `Rooms` inside the
/// handlers.
///
/// This keeps socket transport concerns out of event handling, so tests can
/// exercise dispatch and broadcast behavior end-to-end.
async fn process_event(state: &AppState, conn: &mut Conn, text: &str) -> Vec<Event> {
    let event: Event = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            warn!(client_id = %conn.client_id, error = %err, "ws: invalid inbound event");
            return vec![Event::error(format!("invalid json: {err}"))];
        }
    };

    info!(client_id = %conn.client_id, event = %event.name, "ws: recv event");

    match event.prefix() {
        "chat" => handle_chat(state, conn, &event).await,
        "profile" => handle_profile(state, conn, &event).await,
        "board" => handle_board(state, conn, &event).await,
        _ => vec![Event::error(format!("unknown event: {}", event.name))],
    }
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    match event.op() {
        "join" => join_room(state, conn, event).await,
        "message" => post_message(state, conn, event).await,
        _ => vec![Event::error(format!("unknown chat op: {}", event.op()))],
    }
}

/// `chat:join {room, clientId}` — resolve identity, subscribe, reply with
/// the profile and message history, announce to the rest of the room.
async fn join_room(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    let room = room_name(&event.data);
    let supplied_client_id = event.data.get("clientId").and_then(|v| v.as_str());

    let user = match identity::resolve(&state.pool, &conn.ip, supplied_client_id).await {
        Ok(user) => user,
        Err(err) => return vec![db_error(&err)],
    };

    if conn.chat_rooms.insert(room.clone()) {
        state.rooms.subscribe(&room, conn.client_id, conn.tx.clone()).await;
    }

    let history = match chat::recent_messages(&state.pool).await {
        Ok(messages) => messages,
        Err(err) => return vec![db_error(&err)],
    };
    let history: Vec<serde_json::Value> =
        history.iter().map(|m| message_json(m, &conn.base_url)).collect();

    let announce = Event::new(
        "chat:system",
        serde_json::json!({ "text": format!("{} joined", user.name), "ts": now_ms() }),
    );
    state.rooms.publish(&room, &announce, Some(conn.client_id)).await;

    info!(client_id = %conn.client_id, user_id = user.id, name = %user.name, %room, "chat: joined");

    let profile = profile_event(&user, &conn.ip);
    conn.user = Some(user);

    vec![profile, Event::new("chat:history", serde_json::Value::Array(history))]
}

/// `chat:message {room, text, type}` — persist the content as given,
/// broadcast an absolutized copy to the whole room including the sender.
async fn post_message(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    let Some(user) = &conn.user else {
        return vec![Event::error("join a room first")];
    };

    let room = room_name(&event.data);
    let text = event.data.get("text").and_then(|v| v.as_str()).unwrap_or("");
    let kind = event
        .data
        .get("type")
        .and_then(|v| v.as_str())
        .map_or(MessageKind::Text, MessageKind::parse);

    let message = chat::Message {
        id: Uuid::new_v4(),
        user: user.name.clone(),
        kind,
        content: text.to_string(),
        ts: now_ms(),
    };
    if let Err(err) = chat::insert_message(&state.pool, &message).await {
        return vec![db_error(&err)];
    }

    let outbound = Event::new("chat:message", message_json(&message, &conn.base_url));
    state.rooms.publish(&room, &outbound, None).await;
    vec![]
}

// =============================================================================
// PROFILE HANDLERS
// =============================================================================

async fn handle_profile(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    match event.op() {
        "updateName" => update_name(state, conn, event).await,
        _ => vec![Event::error(format!("unknown profile op: {}", event.op()))],
    }
}

/// `profile:updateName <string>` — trim, silently ignore empty, persist,
/// re-send the profile to the sender only.
async fn update_name(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    let name = event.data.as_str().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return vec![];
    }
    let Some(user) = &mut conn.user else {
        return vec![Event::error("join a room first")];
    };

    if let Err(err) = identity::rename(&state.pool, user.id, &name).await {
        return vec![db_error(&err)];
    }
    user.name = name;
    info!(client_id = %conn.client_id, user_id = user.id, name = %user.name, "profile: renamed");

    vec![profile_event(user, &conn.ip)]
}

// =============================================================================
// BOARD HANDLERS
// =============================================================================

async fn handle_board(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    match event.op() {
        "join" => join_board(state, conn, event).await,
        _ => vec![Event::error(format!("unknown board op: {}", event.op()))],
    }
}

/// `board:join {board_id}` — subscribe to the board's event room, leaving
/// any previously joined board.
async fn join_board(state: &AppState, conn: &mut Conn, event: &Event) -> Vec<Event> {
    let Some(board_id) = parse_board_id(&event.data) else {
        return vec![Event::error("board_id required")];
    };

    match board::board_exists(&state.pool, board_id).await {
        Ok(true) => {}
        Ok(false) => {
            return vec![Event::error_from(&board::BoardError::BoardNotFound(board_id))];
        }
        Err(err) => {
            error!(error = %err, "ws: board lookup failed");
            return vec![Event::error_from(&err)];
        }
    }

    if let Some(previous) = conn.board_room.take() {
        state.rooms.unsubscribe(&previous, conn.client_id).await;
    }
    let room = board_room(board_id);
    state.rooms.subscribe(&room, conn.client_id, conn.tx.clone()).await;
    conn.board_room = Some(room);

    info!(client_id = %conn.client_id, %board_id, "board: joined");
    vec![]
}

/// Board ids arrive as `{board_id: 1}`, `{board_id: "1"}`, or a bare value.
fn parse_board_id(data: &serde_json::Value) -> Option<i64> {
    let field = data.get("board_id").unwrap_or(data);
    if let Some(id) = field.as_i64() {
        return Some(id);
    }
    field.as_str().and_then(|s| s.parse().ok())
}

// =============================================================================
// HELPERS
// =============================================================================

fn room_name(data: &serde_json::Value) -> String {
    let room = data.get("room").and_then(|v| v.as_str()).unwrap_or(DEFAULT_ROOM).trim();
    if room.is_empty() { DEFAULT_ROOM.to_string() } else { room.to_string() }
}

fn profile_event(user: &ChatUser, ip: &str) -> Event {
    Event::new(
        "profile",
        serde_json::json!({ "name": user.name, "ip": ip, "clientId": user.client_id }),
    )
}

/// Serialize a message with its content absolutized for the receiving
/// connection. The stored row keeps the content exactly as posted.
fn message_json(message: &chat::Message, base: &str) -> serde_json::Value {
    let mut json = serde_json::to_value(message).unwrap_or_default();
    let absolute =
        json.get("content").and_then(|v| v.as_str()).map(|content| absolutize(content, base));
    if let Some(content) = absolute {
        json["content"] = serde_json::Value::String(content);
    }
    json
}

fn db_error(err: &sqlx::Error) -> Event {
    error!(error = %err, "ws: database failure");
    Event::error("database error")
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
