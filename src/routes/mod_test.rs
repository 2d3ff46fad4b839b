use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

use super::*;
use crate::event::Event;
use crate::rooms::board_room;
use crate::services::board;
use crate::state::test_helpers;

async fn spawn_app() -> (AppState, SocketAddr) {
    let state = test_helpers::test_app_state().await;
    let router = app(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("test server");
    });
    (state, addr)
}

async fn wait_for_members(state: &AppState, room: &str, count: usize) {
    for _ in 0..50 {
        if state.rooms.member_count(room).await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {room} never reached {count} members");
}

async fn recv_ws_event(
    socket: &mut (impl StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin),
) -> Event {
    loop {
        let msg = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("ws receive timed out")
            .expect("ws stream ended")
            .expect("ws read failed");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("event json");
        }
    }
}

fn ws_text(name: &str, data: serde_json::Value) -> tungstenite::Message {
    tungstenite::Message::text(serde_json::json!({ "event": name, "data": data }).to_string())
}

#[tokio::test]
async fn healthz_responds_ok() {
    let (_state, addr) = spawn_app().await;

    let response = reqwest::get(format!("http://{addr}/healthz")).await.expect("request");
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn column_create_scenario_over_http() {
    let (state, addr) = spawn_app().await;
    let board_id = test_helpers::seed_board(&state, "Main").await;
    let client = reqwest::Client::new();

    let boards: serde_json::Value = client
        .get(format!("http://{addr}/api/boards"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(boards.as_array().map(Vec::len), Some(1));

    let response = client
        .post(format!("http://{addr}/api/boards/{board_id}/columns"))
        .json(&serde_json::json!({ "title": "Todo" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 201);
    let column: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(column.get("board_id").and_then(|v| v.as_i64()), Some(board_id));
    assert_eq!(column.get("title").and_then(|v| v.as_str()), Some("Todo"));
    assert_eq!(column.get("position").and_then(|v| v.as_i64()), Some(1));

    let snapshot: serde_json::Value = client
        .get(format!("http://{addr}/api/boards/{board_id}"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    let columns = snapshot.get("columns").and_then(|v| v.as_array()).expect("columns");
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].get("title").and_then(|v| v.as_str()), Some("Todo"));
    assert_eq!(snapshot.get("cards").and_then(|v| v.as_array()).map(Vec::len), Some(0));
}

#[tokio::test]
async fn card_move_rename_and_delete_routes_are_wired() {
    let (state, addr) = spawn_app().await;
    let board_id = test_helpers::seed_board(&state, "Main").await;
    let todo = board::create_column(&state.pool, board_id, "Todo").await.expect("column");
    let done = board::create_column(&state.pool, board_id, "Done").await.expect("column");
    let card = board::create_card(&state.pool, todo.id, "ship it").await.expect("card");
    let client = reqwest::Client::new();

    let response = client
        .put(format!("http://{addr}/api/columns/{}", todo.id))
        .json(&serde_json::json!({ "title": "Backlog" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let renamed: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(renamed.get("title").and_then(|v| v.as_str()), Some("Backlog"));

    let response = client
        .put(format!("http://{addr}/api/cards/{}", card.id))
        .json(&serde_json::json!({ "column_id": done.id, "position": 1 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let moved: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(moved.get("column_id").and_then(|v| v.as_i64()), Some(done.id));

    let response = client
        .delete(format!("http://{addr}/api/cards/{}", card.id))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 204);

    let response =
        client.get(format!("http://{addr}/api/boards/404")).send().await.expect("request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn board_room_subscriber_receives_rest_broadcasts() {
    let (state, addr) = spawn_app().await;
    let board_id = test_helpers::seed_board(&state, "Main").await;

    let (mut socket, _response) =
        connect_async(format!("ws://{addr}/ws")).await.expect("ws connect");
    socket
        .send(ws_text("board:join", serde_json::json!({ "board_id": board_id })))
        .await
        .expect("send join");
    wait_for_members(&state, &board_room(board_id), 1).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/boards/{board_id}/columns"))
        .json(&serde_json::json!({ "title": "Doing" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 201);

    let event = recv_ws_event(&mut socket).await;
    assert_eq!(event.name, "column.created");
    assert_eq!(event.data.get("title").and_then(|v| v.as_str()), Some("Doing"));
    assert_eq!(event.data.get("board_id").and_then(|v| v.as_i64()), Some(board_id));
}

#[tokio::test]
async fn chat_join_over_websocket_yields_profile_then_history() {
    let (_state, addr) = spawn_app().await;

    let (mut socket, _response) =
        connect_async(format!("ws://{addr}/ws")).await.expect("ws connect");
    socket
        .send(ws_text("chat:join", serde_json::json!({ "room": "general", "clientId": "abc" })))
        .await
        .expect("send join");

    let profile = recv_ws_event(&mut socket).await;
    assert_eq!(profile.name, "profile");
    assert_eq!(profile.data.get("name").and_then(|v| v.as_str()), Some("Unnamed 1"));
    assert_eq!(profile.data.get("ip").and_then(|v| v.as_str()), Some("127.0.0.1"));
    assert_eq!(profile.data.get("clientId").and_then(|v| v.as_str()), Some("abc"));

    let history = recv_ws_event(&mut socket).await;
    assert_eq!(history.name, "chat:history");
    assert_eq!(history.data, serde_json::json!([]));
}

#[tokio::test]
async fn chat_message_flows_between_two_sockets() {
    let (_state, addr) = spawn_app().await;

    let (mut alice, _) = connect_async(format!("ws://{addr}/ws")).await.expect("ws connect");
    alice
        .send(ws_text("chat:join", serde_json::json!({ "clientId": "aaa" })))
        .await
        .expect("send join");
    assert_eq!(recv_ws_event(&mut alice).await.name, "profile");
    assert_eq!(recv_ws_event(&mut alice).await.name, "chat:history");

    let (mut bob, _) = connect_async(format!("ws://{addr}/ws")).await.expect("ws connect");
    bob.send(ws_text("chat:join", serde_json::json!({ "clientId": "bbb" })))
        .await
        .expect("send join");
    let bob_profile = recv_ws_event(&mut bob).await;
    assert_eq!(bob_profile.data.get("name").and_then(|v| v.as_str()), Some("Unnamed 2"));
    assert_eq!(recv_ws_event(&mut bob).await.name, "chat:history");

    let announce = recv_ws_event(&mut alice).await;
    assert_eq!(announce.name, "chat:system");
    assert_eq!(announce.data.get("text").and_then(|v| v.as_str()), Some("Unnamed 2 joined"));

    alice
        .send(ws_text("chat:message", serde_json::json!({ "text": "hello", "type": "text" })))
        .await
        .expect("send message");

    for socket in [&mut alice, &mut bob] {
        let message = recv_ws_event(socket).await;
        assert_eq!(message.name, "chat:message");
        assert_eq!(message.data.get("user").and_then(|v| v.as_str()), Some("Unnamed 1"));
        assert_eq!(message.data.get("content").and_then(|v| v.as_str()), Some("hello"));
        assert_eq!(message.data.get("type").and_then(|v| v.as_str()), Some("text"));
    }
}

#[tokio::test]
async fn upload_round_trip_serves_file_with_cache_headers() {
    let (_state, addr) = spawn_app().await;
    let client = reqwest::Client::new();

    let payload = vec![0x89, b'P', b'N', b'G'];
    let part = reqwest::multipart::Part::bytes(payload.clone())
        .file_name("pic.png")
        .mime_str("image/png")
        .expect("mime");
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body.get("type").and_then(|v| v.as_str()), Some("image"));

    let url = body.get("url").and_then(|v| v.as_str()).expect("url");
    assert!(url.starts_with("http://"), "upload url must be absolute: {url}");
    assert!(url.contains("/uploads/"));
    assert!(url.ends_with(".png"));

    let fetched = client.get(url).send().await.expect("fetch upload");
    assert_eq!(fetched.status().as_u16(), 200);
    assert_eq!(
        fetched.headers().get("cache-control").and_then(|v| v.to_str().ok()),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(fetched.bytes().await.expect("bytes").as_ref(), payload.as_slice());
}

#[tokio::test]
async fn upload_rejects_oversized_and_missing_files() {
    let (state, addr) = spawn_app().await;
    let client = reqwest::Client::new();

    let part = reqwest::multipart::Part::bytes(vec![0u8; upload::MAX_UPLOAD_BYTES + 1])
        .file_name("big.bin")
        .mime_str("application/octet-stream")
        .expect("mime");
    let form = reqwest::multipart::Form::new().part("file", part);
    let response = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body.get("error").and_then(|v| v.as_str()), Some("file too large"));

    let stored = std::fs::read_dir(&state.config.upload_dir).expect("read upload dir").count();
    assert_eq!(stored, 0, "rejected upload must not leave a file behind");

    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let response = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body.get("error").and_then(|v| v.as_str()), Some("no file"));
}
