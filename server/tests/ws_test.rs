//! Integration tests for the strategic map WebSocket: room membership,
//! relay echo rules, cursor self-suppression, and the permissive-connect /
//! restrictive-act policy.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use planmap_server::auth::jwt;
use planmap_server::db::{store, DbPool};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Helper: start the server on a random port and return (addr, db, secret).
async fn start_test_server() -> (SocketAddr, DbPool, Vec<u8>) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = planmap_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = planmap_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = planmap_server::state::AppState {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        rooms: planmap_server::ws::new_room_registry(),
    };

    let app = planmap_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (addr, db, jwt_secret)
}

/// Create a user row and mint an access token for it.
fn seed_user(db: &DbPool, secret: &[u8], username: &str) -> (i64, String) {
    let user_id = {
        let conn = db.lock().unwrap();
        store::create_user(&conn, username).unwrap()
    };
    let token = jwt::issue_access_token(secret, user_id, username).unwrap();
    (user_id, token)
}

async fn connect(addr: SocketAddr, project_id: i64, token: Option<&str>) -> WsStream {
    let url = match token {
        Some(token) => format!("ws://{}/ws/strategic_map/{}?token={}", addr, project_id, token),
        None => format!("ws://{}/ws/strategic_map/{}", addr, project_id),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Read the next text frame as JSON, failing the test on timeout.
async fn recv_json<S>(read: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Expected a frame within timeout")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("Frame is not JSON");
        }
    }
}

/// Assert that no text frame arrives within a short window.
async fn expect_silence<S>(read: &mut S)
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let result = tokio::time::timeout(Duration::from_millis(400), async {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                _ => std::future::pending().await,
            }
        }
    })
    .await;
    assert!(result.is_err(), "Expected silence, got: {:?}", result);
}

#[tokio::test]
async fn sticky_update_echoes_to_sender_and_peer() {
    let (addr, db, secret) = start_test_server().await;
    let (_ua, token_a) = seed_user(&db, &secret, "alice");
    let (_ub, token_b) = seed_user(&db, &secret, "bob");

    let (mut write_a, mut read_a) = connect(addr, 7, Some(&token_a)).await.split();
    let (_write_b, mut read_b) = connect(addr, 7, Some(&token_b)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let payload = serde_json::json!({
        "type": "sticky_update",
        "sticky_id": 12,
        "text": "remember the demo",
        "position_x": 40.0,
        "position_y": 80.5,
    });
    write_a
        .send(Message::Text(payload.to_string().into()))
        .await
        .unwrap();

    // Non-cursor events are echoed to everyone, the sender included.
    let got_a = recv_json(&mut read_a).await;
    let got_b = recv_json(&mut read_b).await;
    assert_eq!(got_a, got_b);
    assert_eq!(got_a["type"], "sticky_update");
    assert_eq!(got_a["sticky_id"], 12);
    assert_eq!(got_a["text"], "remember the demo");
}

#[tokio::test]
async fn cursor_update_suppressed_for_all_owner_connections() {
    let (addr, db, secret) = start_test_server().await;
    let (user_u, token_u) = seed_user(&db, &secret, "ursula");
    let (_user_v, token_v) = seed_user(&db, &secret, "victor");

    // Ursula has two tabs open; Victor has one.
    let (mut write_u1, mut read_u1) = connect(addr, 3, Some(&token_u)).await.split();
    let (_write_u2, mut read_u2) = connect(addr, 3, Some(&token_u)).await.split();
    let (_write_v, mut read_v) = connect(addr, 3, Some(&token_v)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let payload = serde_json::json!({
        "type": "cursor_update",
        "user_id": user_u,
        "username": "ursula",
        "x": 101.0,
        "y": 55.0,
    });
    write_u1
        .send(Message::Text(payload.to_string().into()))
        .await
        .unwrap();

    // Victor receives the cursor; neither of Ursula's tabs does.
    let got_v = recv_json(&mut read_v).await;
    assert_eq!(got_v["type"], "cursor_update");
    assert_eq!(got_v["user_id"], user_u);
    assert_eq!(got_v["x"], 101.0);

    expect_silence(&mut read_u1).await;
    expect_silence(&mut read_u2).await;
}

#[tokio::test]
async fn delete_goal_is_relayed_with_no_persistence_side_effect() {
    let (addr, db, secret) = start_test_server().await;
    let (_ua, token_a) = seed_user(&db, &secret, "alice");
    let (_ub, token_b) = seed_user(&db, &secret, "bob");

    let (mut write_a, mut read_a) = connect(addr, 9, Some(&token_a)).await.split();
    let (_write_b, mut read_b) = connect(addr, 9, Some(&token_b)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    write_a
        .send(Message::Text(
            serde_json::json!({"type": "delete_goal", "goal_id": 4}).to_string().into(),
        ))
        .await
        .unwrap();

    let got_a = recv_json(&mut read_a).await;
    let got_b = recv_json(&mut read_b).await;
    assert_eq!(got_a["type"], "delete_goal");
    assert_eq!(got_a["goal_id"], 4);
    assert_eq!(got_a, got_b);

    // A UI-only broadcast: nothing was written.
    let conn = db.lock().unwrap();
    assert_eq!(store::notification_count(&conn).unwrap(), 0);
    let goal_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM goals", [], |row| row.get(0))
        .unwrap();
    assert_eq!(goal_rows, 0);
}

#[tokio::test]
async fn unknown_type_is_dropped_and_connection_stays_open() {
    let (addr, db, secret) = start_test_server().await;
    let (_ua, token_a) = seed_user(&db, &secret, "alice");
    let (_ub, token_b) = seed_user(&db, &secret, "bob");

    let (mut write_a, mut read_a) = connect(addr, 2, Some(&token_a)).await.split();
    let (_write_b, mut read_b) = connect(addr, 2, Some(&token_b)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Unknown type and malformed JSON are both discarded without a reply.
    write_a
        .send(Message::Text(
            serde_json::json!({"type": "wipe_everything"}).to_string().into(),
        ))
        .await
        .unwrap();
    write_a
        .send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    expect_silence(&mut read_b).await;

    // The connection is still usable afterwards.
    write_a
        .send(Message::Text(
            serde_json::json!({"type": "task_update", "task_id": 1, "title": "t", "status": "Done"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let got_a = recv_json(&mut read_a).await;
    assert_eq!(got_a["type"], "task_update");
    assert_eq!(got_a["status"], "Done");
}

#[tokio::test]
async fn unauthenticated_connection_listens_but_cannot_speak() {
    let (addr, db, secret) = start_test_server().await;
    let (_ua, token_a) = seed_user(&db, &secret, "alice");

    let (mut write_anon, mut read_anon) = connect(addr, 5, None).await.split();
    let (mut write_a, mut read_a) = connect(addr, 5, Some(&token_a)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Events from the unauthenticated connection are silently dropped.
    write_anon
        .send(Message::Text(
            serde_json::json!({"type": "sticky_update", "sticky_id": 1, "text": "spoof"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    expect_silence(&mut read_a).await;

    // But it still receives broadcasts from authenticated members.
    write_a
        .send(Message::Text(
            serde_json::json!({"type": "connection_delete", "connection_id": 8})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let got = recv_json(&mut read_anon).await;
    assert_eq!(got["type"], "connection_delete");
    assert_eq!(got["connection_id"], 8);
}

#[tokio::test]
async fn invalid_token_is_treated_as_unauthenticated() {
    let (addr, db, secret) = start_test_server().await;
    let (_ua, token_a) = seed_user(&db, &secret, "alice");

    let (mut write_bad, _read_bad) = connect(addr, 6, Some("garbage-token")).await.split();
    let (_write_a, mut read_a) = connect(addr, 6, Some(&token_a)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    write_bad
        .send(Message::Text(
            serde_json::json!({"type": "delete_goal", "goal_id": 1}).to_string().into(),
        ))
        .await
        .unwrap();
    expect_silence(&mut read_a).await;
}

#[tokio::test]
async fn empty_room_cursor_update_persists_but_delivers_nothing() {
    let (addr, db, secret) = start_test_server().await;
    let (user_a, token_a) = seed_user(&db, &secret, "alice");
    {
        let conn = db.lock().unwrap();
        store::create_project(&conn, "Solo", "").unwrap();
    }

    let (mut write_a, mut read_a) = connect(addr, 1, Some(&token_a)).await.split();
    tokio::time::sleep(Duration::from_millis(150)).await;

    write_a
        .send(Message::Text(
            serde_json::json!({
                "type": "cursor_update",
                "user_id": user_a,
                "username": "alice",
                "x": 5.0,
                "y": 6.0,
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

    // No one to deliver to (the sender's own cursor is suppressed), no error.
    expect_silence(&mut read_a).await;

    // The side effect still applied.
    let conn = db.lock().unwrap();
    let rows = planmap_server::map::cursor::positions_for_project(&conn, 1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, user_a);
    assert_eq!(rows[0].position_x, 5.0);
    assert_eq!(rows[0].position_y, 6.0);
}
