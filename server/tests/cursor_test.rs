//! Tests for the cursor state store: one row per (user, project),
//! last write wins, authenticated identity is the persistence key.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use planmap_server::auth::jwt;
use planmap_server::db::{store, DbPool};
use planmap_server::map::cursor;

fn test_db() -> (tempfile::TempDir, DbPool) {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let db = planmap_server::db::init_db(tmp.path().to_str().unwrap()).expect("Failed to init DB");
    (tmp, db)
}

#[test]
fn upsert_twice_keeps_exactly_one_row_with_latest_values() {
    let (_tmp, db) = test_db();
    let conn = db.lock().unwrap();
    let user = store::create_user(&conn, "alice").unwrap();
    let project = store::create_project(&conn, "Map", "").unwrap();

    cursor::upsert_position(&conn, user, project, 1.0, 2.0).unwrap();
    cursor::upsert_position(&conn, user, project, 30.5, -4.25).unwrap();

    let rows = cursor::positions_for_project(&conn, project).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, user);
    assert_eq!(rows[0].position_x, 30.5);
    assert_eq!(rows[0].position_y, -4.25);
}

#[test]
fn positions_are_scoped_per_project() {
    let (_tmp, db) = test_db();
    let conn = db.lock().unwrap();
    let user = store::create_user(&conn, "alice").unwrap();
    let p1 = store::create_project(&conn, "One", "").unwrap();
    let p2 = store::create_project(&conn, "Two", "").unwrap();

    cursor::upsert_position(&conn, user, p1, 1.0, 1.0).unwrap();
    cursor::upsert_position(&conn, user, p2, 2.0, 2.0).unwrap();

    assert_eq!(cursor::positions_for_project(&conn, p1).unwrap().len(), 1);
    assert_eq!(cursor::positions_for_project(&conn, p2).unwrap().len(), 1);
}

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

/// Poll until the cursor table has a row for the project, or time out.
async fn wait_for_rows(db: &DbPool, project_id: i64) -> Vec<planmap_server::db::models::CursorPosition> {
    for _ in 0..20 {
        {
            let conn = db.lock().unwrap();
            let rows = cursor::positions_for_project(&conn, project_id).unwrap();
            if !rows.is_empty() {
                return rows;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Vec::new()
}

#[tokio::test]
async fn ws_cursor_upsert_is_keyed_by_authenticated_user() {
    let (addr, db, secret) = start_test_server().await;
    let (user_a, project) = {
        let conn = db.lock().unwrap();
        let user = store::create_user(&conn, "alice").unwrap();
        let project = store::create_project(&conn, "Map", "").unwrap();
        (user, project)
    };
    let token = jwt::issue_access_token(&secret, user_a, "alice").unwrap();

    let url = format!("ws://{}/ws/strategic_map/{}?token={}", addr, project, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut write, _read) = ws_stream.split();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The payload claims a different user id; persistence must use the
    // credential's identity, not the payload's.
    write
        .send(Message::Text(
            serde_json::json!({
                "type": "cursor_update",
                "user_id": 9999,
                "username": "mallory",
                "x": 7.0,
                "y": 8.0,
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

    let rows = wait_for_rows(&db, project).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, user_a);
}

#[tokio::test]
async fn unauthenticated_cursor_update_is_not_persisted() {
    let (addr, db, _secret) = start_test_server().await;
    let project = {
        let conn = db.lock().unwrap();
        store::create_project(&conn, "Map", "").unwrap()
    };

    let url = format!("ws://{}/ws/strategic_map/{}", addr, project);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut write, _read) = ws_stream.split();
    tokio::time::sleep(Duration::from_millis(100)).await;

    write
        .send(Message::Text(
            serde_json::json!({
                "type": "cursor_update",
                "user_id": 1,
                "username": "anon",
                "x": 1.0,
                "y": 1.0,
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let conn = db.lock().unwrap();
    assert!(cursor::positions_for_project(&conn, project).unwrap().is_empty());
}
