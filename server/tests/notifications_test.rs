//! Integration tests for the REST surface: notifications, status-change
//! triggers, announcements and the roster.

use futures_util::{SinkExt, StreamExt};
use portal_server::config::RealtimeConfig;
use portal_server::db::models::Role;
use portal_server::state::AppState;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Helper: start the server on a random port.
async fn start_test_server() -> (String, SocketAddr, AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = portal_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = portal_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    let state = AppState::new(db, jwt_secret, RealtimeConfig::default());

    let app = portal_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, state)
}

fn token(state: &AppState, user_id: &str, role: Role) -> String {
    portal_server::auth::jwt::issue_access_token(&state.jwt_secret, user_id, role).unwrap()
}

async fn put_roster(client: &reqwest::Client, base_url: &str, admin: &str, id: &str, role: &str) {
    let resp = client
        .put(format!("{}/api/directory/{}", base_url, id))
        .bearer_auth(admin)
        .json(&json!({"name": format!("User {}", id), "role": role}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn get_json_list(client: &reqwest::Client, url: &str, bearer: &str) -> Vec<Value> {
    client
        .get(url)
        .bearer_auth(bearer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (base_url, _, _) = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_endpoints_require_token() {
    let (base_url, _, _) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/notifications", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_change_notifies_student() {
    let (base_url, addr, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let proctor = token(&state, "proctor-1", Role::Proctor);
    let student = token(&state, "s-1", Role::Student);

    // Student is online and bound
    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();
    write
        .send(Message::Text(
            json!({"event": "addUser", "data": {"userId": "s-1"}}).to_string().into(),
        ))
        .await
        .unwrap();
    let ack = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .unwrap();
    assert!(matches!(ack, Some(Ok(Message::Text(_)))));

    let resp = client
        .post(format!("{}/api/notifications/status", base_url))
        .bearer_auth(&proctor)
        .json(&json!({
            "kind": "document",
            "studentId": "s-1",
            "title": "thesis.pdf",
            "status": "approved"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["message"], "Your document 'thesis.pdf' has been approved.");
    assert_eq!(created["link"], "/student/documents");

    let pushed = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected live push");
    let pushed: Value = match pushed {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected text frame, got {:?}", other),
    };
    assert_eq!(pushed["event"], "newNotification");
    assert_eq!(pushed["data"], created);

    let stored: Vec<Value> = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored, vec![created]);
}

#[tokio::test]
async fn test_project_status_for_offline_student() {
    let (base_url, _, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let proctor = token(&state, "proctor-1", Role::Proctor);

    let resp = client
        .post(format!("{}/api/notifications/status", base_url))
        .bearer_auth(&proctor)
        .json(&json!({
            "kind": "project",
            "studentId": "s-2",
            "title": "Robot Arm",
            "status": "graded"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let stored: Vec<Value> = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(token(&state, "s-2", Role::Student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["message"], "Your project 'Robot Arm' has been graded.");
    assert_eq!(stored[0]["isRead"], false);
}

#[tokio::test]
async fn test_student_cannot_create_notifications() {
    let (base_url, _, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let student = token(&state, "s-1", Role::Student);

    let resp = client
        .post(format!("{}/api/notifications", base_url))
        .bearer_auth(&student)
        .json(&json!({"userId": "s-2", "message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .post(format!("{}/api/broadcast", base_url))
        .bearer_auth(&student)
        .json(&json!({"senderName": "s-1", "content": "hi all"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_notifications_newest_first_and_mark_read() {
    let (base_url, _, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let proctor = token(&state, "proctor-1", Role::Proctor);
    let student = token(&state, "s-1", Role::Student);

    for message in ["first", "second", "third"] {
        let resp = client
            .post(format!("{}/api/notifications", base_url))
            .bearer_auth(&proctor)
            .json(&json!({"userId": "s-1", "message": message}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let list: Vec<Value> = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages: Vec<&str> = list.iter().map(|n| n["message"].as_str().unwrap()).collect();
    assert_eq!(messages, vec!["third", "second", "first"]);
    assert!(list.iter().all(|n| n["isRead"] == false));
    assert!(list[0]["link"].is_null());

    let resp: Value = client
        .put(format!("{}/api/notifications/mark-read", base_url))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["updated"], 3);

    let resp: Value = client
        .put(format!("{}/api/notifications/mark-read", base_url))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["updated"], 0);

    let list: Vec<Value> = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.iter().all(|n| n["isRead"] == true));
}

#[tokio::test]
async fn test_rest_broadcast_reports_fanout() {
    let (base_url, _, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let proctor = token(&state, "proctor-1", Role::Proctor);

    put_roster(&client, &base_url, &proctor, "proctor-1", "proctor").await;
    for id in ["s-1", "s-2", "s-3"] {
        put_roster(&client, &base_url, &proctor, id, "student").await;
    }

    let report: Value = client
        .post(format!("{}/api/broadcast", base_url))
        .bearer_auth(&proctor)
        .json(&json!({"senderName": "Dr. Rao", "content": "Exam moved to Friday"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["recipients"], 3);
    assert_eq!(report["persisted"], 3);
    assert_eq!(report["delivered"], 0);
    assert_eq!(report["failed"], 0);

    for id in ["s-1", "s-2", "s-3"] {
        let list: Vec<Value> = client
            .get(format!("{}/api/notifications", base_url))
            .bearer_auth(token(&state, id, Role::Student))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["message"], "Announcement from Dr. Rao: Exam moved to Friday");
        assert_eq!(list[0]["link"], "/student/resources");
    }
}

#[tokio::test]
async fn test_directory_roundtrip() {
    let (base_url, _, state) = start_test_server().await;
    let client = reqwest::Client::new();
    let proctor = token(&state, "proctor-1", Role::Proctor);

    let resp = client
        .get(format!("{}/api/directory/s-9", base_url))
        .bearer_auth(&proctor)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    put_roster(&client, &base_url, &proctor, "s-9", "student").await;
    let user: Value = client
        .get(format!("{}/api/directory/s-9", base_url))
        .bearer_auth(&proctor)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["id"], "s-9");
    assert_eq!(user["role"], "student");

    let resp = client
        .put(format!("{}/api/directory/s-9", base_url))
        .bearer_auth(token(&state, "s-9", Role::Student))
        .json(&json!({"name": "Me", "role": "proctor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_chat_history_is_idempotent() {
    let (base_url, _, state) = start_test_server().await;
    portal_server::chat::messages::send_chat_message(&state, "A", "B", "one")
        .await
        .unwrap();
    portal_server::chat::messages::send_chat_message(&state, "B", "A", "two")
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let caller = token(&state, "A", Role::Student);
    let first = get_json_list(&client, &format!("{}/api/chat/history/B", base_url), &caller).await;
    let second = get_json_list(&client, &format!("{}/api/chat/history/B", base_url), &caller).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["content"], "one");
    assert_eq!(first[1]["content"], "two");
    assert_eq!(first, second);

    let unrelated: Vec<Value> = client
        .get(format!("{}/api/chat/history/C", base_url))
        .bearer_auth(token(&state, "A", Role::Student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(unrelated.is_empty());
}
